// src/sinks/mod.rs
//! Consumers of buffered data
//!
//! Sinks run on their own threads (periodic snapshot sinks) or on the force
//! ingest thread (raw row sinks) and never while a buffer lock is held.

pub mod csv_log;
pub mod render;

pub use csv_log::{CsvDatasetLogger, RawForceLog};
pub use render::{RenderFrame, TracingRenderSink};

use crate::acquisition::snapshot::Snapshot;
use crate::error::SinkError;

/// Receives one snapshot per scheduler tick
pub trait SnapshotSink: Send {
    fn name(&self) -> &str;

    fn consume(&mut self, snapshot: &Snapshot) -> Result<(), SinkError>;
}

/// Receives every committed force reading
pub trait RowSink: Send {
    /// `raw` and `forces` hold one entry per force channel, committed at
    /// `timestamp_us` on the ingest clock
    fn write_row(&mut self, timestamp_us: u64, raw: &[u32], forces: &[f64]) -> Result<(), SinkError>;
}

impl<T: SnapshotSink + ?Sized> SnapshotSink for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn consume(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        (**self).consume(snapshot)
    }
}
