// src/sinks/csv_log.rs
//! CSV file sinks
//!
//! Both writers flush after every row, unconditionally: a crash loses at
//! most the row being written.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::acquisition::snapshot::Snapshot;
use crate::config::constants::emg::CHANNEL_COUNT;
use crate::error::SinkError;
use crate::sinks::{RowSink, SnapshotSink};

const DATASET_PREAMBLE: &[&str] = &[
    "EMG and force columns come from independent device clocks.",
    "Each row pairs the latest value of every channel at timestamp_s (logger clock); alignment is best-effort.",
];

/// Fixed-cadence merged rows `timestamp_s,EMG1..EMG8,Force1..ForceN`
pub struct CsvDatasetLogger<W: Write = File> {
    writer: csv::Writer<W>,
    force_channels: usize,
    rows: u64,
    record: Vec<String>,
}

impl CsvDatasetLogger<File> {
    pub fn create<P: AsRef<Path>>(path: P, force_channels: usize) -> Result<Self, SinkError> {
        let file = File::create(path.as_ref())?;
        info!(path = %path.as_ref().display(), "dataset log opened");
        Self::from_writer(file, force_channels)
    }
}

impl<W: Write> CsvDatasetLogger<W> {
    /// Write the preamble comments and header to `inner`
    pub fn from_writer(mut inner: W, force_channels: usize) -> Result<Self, SinkError> {
        for line in DATASET_PREAMBLE {
            writeln!(inner, "# {}", line)?;
        }

        let mut writer = csv::Writer::from_writer(inner);
        let header = std::iter::once("timestamp_s".to_string())
            .chain((1..=CHANNEL_COUNT).map(|i| format!("EMG{}", i)))
            .chain((1..=force_channels).map(|i| format!("Force{}", i)));
        writer.write_record(header)?;
        writer.flush()?;

        Ok(Self {
            writer,
            force_channels,
            rows: 0,
            record: Vec::with_capacity(1 + CHANNEL_COUNT + force_channels),
        })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))
    }
}

impl<W: Write + Send> SnapshotSink for CsvDatasetLogger<W> {
    fn name(&self) -> &str {
        "dataset-log"
    }

    fn consume(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        if snapshot.emg.len() != CHANNEL_COUNT || snapshot.force.len() != self.force_channels {
            return Err(SinkError::Shape(format!(
                "expected {} EMG and {} force channels, got {} and {}",
                CHANNEL_COUNT,
                self.force_channels,
                snapshot.emg.len(),
                snapshot.force.len()
            )));
        }

        self.record.clear();
        self.record.push(format!("{:.6}", snapshot.taken_at_secs()));
        self.record.extend(snapshot.latest_emg().iter().map(f32::to_string));
        self.record.extend(snapshot.latest_force().iter().map(f64::to_string));

        self.writer.write_record(&self.record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

/// Every committed force reading as `timestamp_s,raw1..rawN,force1..forceN`
pub struct RawForceLog<W: Write = File> {
    writer: csv::Writer<W>,
    channels: usize,
}

impl RawForceLog<File> {
    pub fn create<P: AsRef<Path>>(path: P, channels: usize) -> Result<Self, SinkError> {
        let file = File::create(path.as_ref())?;
        info!(path = %path.as_ref().display(), "raw force log opened");
        Self::from_writer(file, channels)
    }
}

impl<W: Write> RawForceLog<W> {
    pub fn from_writer(inner: W, channels: usize) -> Result<Self, SinkError> {
        let mut writer = csv::Writer::from_writer(inner);
        let header = std::iter::once("timestamp_s".to_string())
            .chain((1..=channels).map(|i| format!("raw{}", i)))
            .chain((1..=channels).map(|i| format!("force{}", i)));
        writer.write_record(header)?;
        writer.flush()?;

        Ok(Self { writer, channels })
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))
    }
}

impl<W: Write + Send> RowSink for RawForceLog<W> {
    fn write_row(&mut self, timestamp_us: u64, raw: &[u32], forces: &[f64]) -> Result<(), SinkError> {
        if raw.len() != self.channels || forces.len() != self.channels {
            return Err(SinkError::Shape(format!(
                "expected {} channels, got {} raw and {} forces",
                self.channels,
                raw.len(),
                forces.len()
            )));
        }

        let row = std::iter::once(format!("{:.6}", timestamp_us as f64 / 1e6))
            .chain(raw.iter().map(u32::to_string))
            .chain(forces.iter().map(f64::to_string));
        self.writer.write_record(row)?;
        self.writer.flush()?;
        Ok(())
    }
}
