// src/acquisition/force_ingest.rs
//! Force producer side: serial lines to calibrated force buffers
//!
//! A reading moves Idle → LineReady → Parsed → Converted → Committed and
//! back to Idle. Parsing is all-or-nothing: one bad token discards the whole
//! line. A committed reading lands in every channel buffer under one lock
//! acquisition, so readers see either all of it or none of it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::acquisition::ring_buffer::{ChannelBuffer, RingBufferError, Sample};
use crate::acquisition::stats::{IngestCounters, IngestStats};
use crate::config::constants::serial::MAX_LINE_BYTES;
use crate::config::constants::sinks::FAILURE_LOG_INTERVAL;
use crate::error::{ParseError, TransportError};
use crate::hal::traits::LineTransport;
use crate::scheduler::StopToken;
use crate::sinks::RowSink;
use crate::utils::conversion::ForceConverter;
use crate::utils::time::{MonotonicTimeProvider, TimeProvider};

/// Stage of the reading currently being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IngestState {
    Idle = 0,
    LineReady = 1,
    Parsed = 2,
    Converted = 3,
    Committed = 4,
}

impl IngestState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::LineReady,
            2 => Self::Parsed,
            3 => Self::Converted,
            4 => Self::Committed,
            _ => Self::Idle,
        }
    }
}

/// One reading that made it into the buffers
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedReading {
    pub timestamp_us: u64,
    pub raw: Vec<u32>,
    pub forces: Vec<f64>,
}

/// Why the ingest loop returned
#[derive(Debug)]
pub enum IngestExit {
    Stopped,
    Transport(TransportError),
}

/// Split a line into exactly `channels` unsigned decimal readings.
///
/// Surrounding whitespace (including a stray `\r`) is ignored, both around
/// the line and around each token. Anything else is rejected.
pub fn parse_line(line: &[u8], channels: usize) -> Result<Vec<u32>, ParseError> {
    if line.len() > MAX_LINE_BYTES {
        return Err(ParseError::TooLong {
            len: line.len(),
            max: MAX_LINE_BYTES,
        });
    }

    let text = std::str::from_utf8(line).map_err(|_| ParseError::NotUtf8)?.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let tokens: Vec<&str> = text.split(',').map(str::trim).collect();
    if tokens.len() != channels {
        return Err(ParseError::WrongTokenCount {
            expected: channels,
            actual: tokens.len(),
        });
    }

    tokens
        .iter()
        .enumerate()
        .map(|(index, token)| {
            let digits_only = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
            digits_only
                .then(|| token.parse::<u32>().ok())
                .flatten()
                .ok_or_else(|| ParseError::InvalidToken {
                    index,
                    token: (*token).to_string(),
                })
        })
        .collect()
}

/// Owns the force buffer set and the loop that fills it
pub struct ForceIngest {
    buffers: Mutex<Vec<ChannelBuffer<f64>>>,
    channels: usize,
    converter: ForceConverter,
    counters: IngestCounters,
    state: AtomicU8,
    raw_log: Mutex<Option<Box<dyn RowSink>>>,
    clock: Arc<dyn TimeProvider>,
}

impl ForceIngest {
    pub fn new(channels: usize, capacity: usize, converter: ForceConverter) -> Result<Self, RingBufferError> {
        if channels == 0 {
            return Err(RingBufferError::NoChannels);
        }

        let buffers = (0..channels)
            .map(|_| ChannelBuffer::new(capacity))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            buffers: Mutex::new(buffers),
            channels,
            converter,
            counters: IngestCounters::new(),
            state: AtomicU8::new(IngestState::Idle as u8),
            raw_log: Mutex::new(None),
            clock: Arc::new(MonotonicTimeProvider::new()),
        })
    }

    /// Stamp readings with `clock` instead of the monotonic default
    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Mirror every committed reading to `sink`
    pub fn with_raw_log(self, sink: Box<dyn RowSink>) -> Self {
        *self.raw_log.lock() = Some(sink);
        self
    }

    /// Process one line from the transport. A rejected line is counted as
    /// dropped and leaves every buffer untouched.
    pub fn ingest_line(&self, line: &[u8]) -> Result<CommittedReading, ParseError> {
        self.set_state(IngestState::LineReady);

        let raw = match parse_line(line, self.channels) {
            Ok(raw) => raw,
            Err(err) => {
                self.set_state(IngestState::Idle);
                let dropped = self.counters.record_dropped();
                debug!(error = %err, dropped, "dropping force line");
                return Err(err);
            }
        };
        self.set_state(IngestState::Parsed);

        let forces: Vec<f64> = raw.iter().map(|&value| self.converter.convert(value)).collect();
        self.set_state(IngestState::Converted);

        let timestamp_us = self.clock.now_micros();
        {
            let mut buffers = self.buffers.lock();
            for (buffer, &force) in buffers.iter_mut().zip(&forces) {
                buffer.push(Sample::new(timestamp_us, force));
            }
        }
        self.counters.record_accepted(timestamp_us);
        self.set_state(IngestState::Committed);
        trace!(timestamp_us, ?forces, "force reading committed");

        self.mirror(timestamp_us, &raw, &forces);
        self.set_state(IngestState::Idle);

        Ok(CommittedReading {
            timestamp_us,
            raw,
            forces,
        })
    }

    /// Read and ingest lines until stopped or the transport fails.
    ///
    /// Parse failures never end the loop. On return the buffers hold every
    /// reading committed so far and stay readable.
    pub fn run<T: LineTransport + ?Sized>(&self, transport: &mut T, stop: &StopToken) -> IngestExit {
        info!(transport = %transport.describe(), channels = self.channels, "force ingest started");
        let mut line = Vec::with_capacity(MAX_LINE_BYTES);

        let exit = loop {
            if stop.is_stopped() {
                break IngestExit::Stopped;
            }

            match transport.read_line(&mut line) {
                // Rejections are counted and logged inside
                Ok(()) => {
                    let _ = self.ingest_line(&line);
                }
                Err(err) => {
                    warn!(transport = %transport.describe(), error = %err, "force ingest terminated by transport");
                    break IngestExit::Transport(err);
                }
            }
        };

        self.set_state(IngestState::Idle);
        info!(stats = ?self.counters.snapshot(), "force ingest stopped");
        exit
    }

    /// One zero-padded window of length `k` per force channel, copied
    /// under a single lock acquisition
    pub fn snapshot(&self, k: usize) -> Vec<Vec<f64>> {
        let mut channels = vec![Vec::with_capacity(k); self.channels];
        self.snapshot_into(k, &mut channels);
        channels
    }

    /// Like [`snapshot`](Self::snapshot) into caller-owned per-channel vectors
    pub fn snapshot_into(&self, k: usize, channels: &mut [Vec<f64>]) {
        let buffers = self.buffers.lock();
        for (buffer, channel) in buffers.iter().zip(channels.iter_mut()) {
            channel.clear();
            buffer.window_into(k, channel);
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity(&self) -> usize {
        self.buffers.lock().first().map_or(0, ChannelBuffer::capacity)
    }

    pub fn state(&self) -> IngestState {
        IngestState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn converter(&self) -> &ForceConverter {
        &self.converter
    }

    pub fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }

    fn set_state(&self, state: IngestState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn mirror(&self, timestamp_us: u64, raw: &[u32], forces: &[f64]) {
        let mut raw_log = self.raw_log.lock();
        let Some(sink) = raw_log.as_mut() else {
            return;
        };

        if let Err(err) = sink.write_row(timestamp_us, raw, forces) {
            let failures = self.counters.record_log_failure();
            if failures == 1 || failures % FAILURE_LOG_INTERVAL == 0 {
                warn!(failures, error = %err, "raw force log write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::calibration::{CalibrationModel, PolynomialCoefficients};
    use crate::error::SinkError;
    use crate::hal::simulator::ScriptedTransport;
    use crate::scheduler::StopSignal;
    use crate::utils::time::MockTimeProvider;

    fn identity_converter() -> ForceConverter {
        // Force equals voltage
        let model = CalibrationModel::Polynomial(PolynomialCoefficients {
            a: 0.0,
            b: 0.0,
            c: 1.0,
            d: 0.0,
        });
        ForceConverter::with_reference(Arc::new(model), 1.0, 1)
    }

    fn ingest(channels: usize, capacity: usize) -> ForceIngest {
        ForceIngest::new(channels, capacity, identity_converter()).unwrap()
    }

    #[test]
    fn test_parse_valid_lines() {
        assert_eq!(parse_line(b"1,2,3,4,5", 5).unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_line(b" 0, 1023 ,7,8,9\r", 5).unwrap(), vec![0, 1023, 7, 8, 9]);
        // Above full scale is still a reading
        assert_eq!(parse_line(b"4000", 1).unwrap(), vec![4000]);
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(parse_line(b"", 5), Err(ParseError::Empty));
        assert_eq!(parse_line(b"  \r", 5), Err(ParseError::Empty));
        assert_eq!(
            parse_line(b"1,2,3", 5),
            Err(ParseError::WrongTokenCount { expected: 5, actual: 3 })
        );
        assert_eq!(
            parse_line(b"1,2,3,4,5,6", 5),
            Err(ParseError::WrongTokenCount { expected: 5, actual: 6 })
        );
        assert_eq!(
            parse_line(b"1,2,x,4,5", 5),
            Err(ParseError::InvalidToken { index: 2, token: "x".to_string() })
        );
        assert_eq!(
            parse_line(b"1,,3,4,5", 5),
            Err(ParseError::InvalidToken { index: 1, token: String::new() })
        );
        assert!(matches!(parse_line(b"-1,2,3,4,5", 5), Err(ParseError::InvalidToken { index: 0, .. })));
        assert!(matches!(parse_line(b"+1,2,3,4,5", 5), Err(ParseError::InvalidToken { index: 0, .. })));
        assert!(matches!(parse_line(b"1.5,2,3,4,5", 5), Err(ParseError::InvalidToken { index: 0, .. })));
        assert!(matches!(
            parse_line(b"99999999999,2,3,4,5", 5),
            Err(ParseError::InvalidToken { index: 0, .. })
        ));
        assert_eq!(parse_line(&[0xff, b',', b'1'], 2), Err(ParseError::NotUtf8));

        let long = vec![b'1'; MAX_LINE_BYTES + 1];
        assert!(matches!(parse_line(&long, 1), Err(ParseError::TooLong { .. })));
    }

    #[test]
    fn test_valid_line_commits_every_channel() {
        let ingest = ingest(5, 16);
        let reading = ingest.ingest_line(b"10,20,30,40,50").unwrap();

        assert_eq!(reading.raw, vec![10, 20, 30, 40, 50]);
        let windows = ingest.snapshot(2);
        assert_eq!(windows.len(), 5);
        for (channel, window) in windows.iter().enumerate() {
            assert_eq!(window, &vec![0.0, 10.0 * (channel + 1) as f64]);
        }
        assert_eq!(ingest.stats().accepted, 1);
        assert_eq!(ingest.state(), IngestState::Idle);
    }

    #[test]
    fn test_bad_token_commits_nothing() {
        let ingest = ingest(5, 16);
        ingest.ingest_line(b"1,2,3,4,5").unwrap();

        // Earlier tokens are valid, but nothing may be committed
        assert!(ingest.ingest_line(b"6,7,8,oops,10").is_err());

        let windows = ingest.snapshot(2);
        for (channel, window) in windows.iter().enumerate() {
            assert_eq!(window, &vec![0.0, (channel + 1) as f64]);
        }
        let stats = ingest.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(ingest.state(), IngestState::Idle);
    }

    #[test]
    fn test_timestamps_from_time_provider() {
        let clock = Arc::new(MockTimeProvider::new(5_000));
        let ingest = ingest(1, 4).with_time_provider(clock.clone());

        assert_eq!(ingest.ingest_line(b"1").unwrap().timestamp_us, 5_000);
        clock.advance_by(10_000);
        ingest.ingest_line(b"2").unwrap();

        let stats = ingest.stats();
        assert_eq!(stats.first_sample_us, Some(5_000));
        assert_eq!(stats.last_sample_us, Some(15_000));
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(matches!(
            ForceIngest::new(0, 16, identity_converter()),
            Err(RingBufferError::NoChannels)
        ));
        assert!(matches!(
            ForceIngest::new(5, 0, identity_converter()),
            Err(RingBufferError::InvalidCapacity(0))
        ));
    }

    #[derive(Clone, Default)]
    struct SharedRows(Arc<Mutex<Vec<(u64, Vec<u32>, Vec<f64>)>>>);

    impl RowSink for SharedRows {
        fn write_row(&mut self, timestamp_us: u64, raw: &[u32], forces: &[f64]) -> Result<(), SinkError> {
            self.0.lock().push((timestamp_us, raw.to_vec(), forces.to_vec()));
            Ok(())
        }
    }

    struct BrokenSink;

    impl RowSink for BrokenSink {
        fn write_row(&mut self, _timestamp_us: u64, _raw: &[u32], _forces: &[f64]) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    #[test]
    fn test_raw_log_mirrors_committed_rows_only() {
        let rows = SharedRows::default();
        let clock = Arc::new(MockTimeProvider::new(45));
        let ingest = ingest(2, 4)
            .with_time_provider(clock.clone())
            .with_raw_log(Box::new(rows.clone()));

        ingest.ingest_line(b"1,2").unwrap();
        clock.advance_by(10);
        let _ = ingest.ingest_line(b"3");
        let committed = ingest.ingest_line(b"4,5").unwrap();

        let rows = rows.0.lock();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 45);
        // The mirrored row carries the commit timestamp
        assert_eq!(rows[1], (committed.timestamp_us, vec![4, 5], vec![4.0, 5.0]));
        assert_eq!(committed.timestamp_us, 55);
    }

    #[test]
    fn test_log_failures_do_not_stop_ingest() {
        let ingest = ingest(1, 4).with_raw_log(Box::new(BrokenSink));

        for _ in 0..3 {
            ingest.ingest_line(b"7").unwrap();
        }
        let stats = ingest.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.log_failures, 3);
    }

    #[test]
    fn test_run_until_disconnect() {
        let ingest = ingest(5, 8);
        let stop = StopSignal::new();
        let mut transport = ScriptedTransport::new(["1,1,1,1,1", "garbage", "2,2,2,2,2", "3,3,3"]);

        let exit = ingest.run(&mut transport, &stop.token());
        assert!(matches!(exit, IngestExit::Transport(TransportError::Disconnected(_))));

        let stats = ingest.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.dropped, 2);
        // Buffers stay readable after the loop ended
        assert_eq!(ingest.snapshot(3)[4], vec![0.0, 1.0, 2.0]);
        assert_eq!(ingest.state(), IngestState::Idle);
    }

    #[test]
    fn test_run_observes_stop() {
        let ingest = ingest(1, 8);
        let stop = StopSignal::new();
        stop.stop();

        let mut transport = ScriptedTransport::new(["1"]);
        assert!(matches!(ingest.run(&mut transport, &stop.token()), IngestExit::Stopped));
        assert_eq!(transport.remaining(), 1);
    }
}
