// src/acquisition/emg_ingest.rs
//! EMG producer side: the device's push handler and its buffer
//!
//! One device push is one frame of all eight channels, stored as a single
//! ring entry so a reader can never see channels from two different pushes.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::acquisition::ring_buffer::{ChannelBuffer, RingBufferError, Sample};
use crate::acquisition::stats::{IngestCounters, IngestStats};
use crate::config::constants::emg::CHANNEL_COUNT;
use crate::error::DeviceFrameError;
use crate::hal::traits::{EmgListener, EmgStreamControl};

/// All channel readings from one device push
pub type EmgFrame = [f32; CHANNEL_COUNT];

/// Owns the EMG buffer and receives frames from the device thread
#[derive(Debug)]
pub struct EmgIngest {
    buffer: Mutex<ChannelBuffer<EmgFrame>>,
    counters: IngestCounters,
    connected: AtomicBool,
}

impl EmgIngest {
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        Ok(Self {
            buffer: Mutex::new(ChannelBuffer::new(capacity)?),
            counters: IngestCounters::new(),
            connected: AtomicBool::new(false),
        })
    }

    /// Validate and store one frame. The lock is held for the push only.
    pub fn record(&self, timestamp_us: u64, values: &[f32]) -> Result<(), DeviceFrameError> {
        let frame = to_frame(values)?;
        self.buffer.lock().push(Sample::new(timestamp_us, frame));
        self.counters.record_accepted(timestamp_us);
        Ok(())
    }

    /// One zero-padded window of length `k` per channel, copied under a
    /// single lock acquisition
    pub fn snapshot(&self, k: usize) -> Vec<Vec<f32>> {
        let mut channels = vec![Vec::with_capacity(k); CHANNEL_COUNT];
        self.snapshot_into(k, &mut channels);
        channels
    }

    /// Like [`snapshot`](Self::snapshot) into caller-owned per-channel vectors
    pub fn snapshot_into(&self, k: usize, channels: &mut [Vec<f32>]) {
        let frames = {
            let buffer = self.buffer.lock();
            buffer.window(k)
        };

        for (index, channel) in channels.iter_mut().enumerate().take(CHANNEL_COUNT) {
            channel.clear();
            channel.extend(frames.iter().map(|frame| frame[index]));
        }
    }

    pub fn latest(&self) -> Option<Sample<EmgFrame>> {
        self.buffer.lock().latest().copied()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }
}

fn to_frame(values: &[f32]) -> Result<EmgFrame, DeviceFrameError> {
    let frame: EmgFrame = values.try_into().map_err(|_| DeviceFrameError::WrongChannelCount {
        expected: CHANNEL_COUNT,
        actual: values.len(),
    })?;

    if let Some(channel) = frame.iter().position(|v| !v.is_finite()) {
        return Err(DeviceFrameError::NonFinite { channel });
    }
    Ok(frame)
}

impl EmgListener for EmgIngest {
    fn on_connected(&self, device: &mut dyn EmgStreamControl) {
        match device.stream_emg(true) {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                info!("EMG device connected, streaming enabled");
            }
            Err(err) => warn!(error = %err, "EMG device connected but refused to stream"),
        }
    }

    fn on_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        info!(stats = ?self.counters.snapshot(), "EMG device disconnected");
    }

    fn on_frame(&self, timestamp_us: u64, values: &[f32]) {
        if let Err(err) = self.record(timestamp_us, values) {
            let dropped = self.counters.record_dropped();
            debug!(error = %err, dropped, "dropping EMG frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::traits::DeviceCommandError;

    struct FakeDevice {
        streaming: bool,
        refuse: bool,
    }

    impl EmgStreamControl for FakeDevice {
        fn stream_emg(&mut self, enabled: bool) -> Result<(), DeviceCommandError> {
            if self.refuse {
                return Err(DeviceCommandError {
                    command: "stream_emg",
                    reason: "not paired".to_string(),
                });
            }
            self.streaming = enabled;
            Ok(())
        }
    }

    fn frame(base: f32) -> Vec<f32> {
        (0..CHANNEL_COUNT).map(|c| base + c as f32).collect()
    }

    #[test]
    fn test_connect_enables_streaming() {
        let ingest = EmgIngest::new(16).unwrap();
        let mut device = FakeDevice { streaming: false, refuse: false };

        ingest.on_connected(&mut device);
        assert!(device.streaming);
        assert!(ingest.is_connected());

        ingest.on_disconnected();
        assert!(!ingest.is_connected());
    }

    #[test]
    fn test_refused_stream_command_is_not_fatal() {
        let ingest = EmgIngest::new(16).unwrap();
        let mut device = FakeDevice { streaming: false, refuse: true };

        ingest.on_connected(&mut device);
        assert!(!ingest.is_connected());
    }

    #[test]
    fn test_frames_split_per_channel() {
        let ingest = EmgIngest::new(16).unwrap();
        ingest.on_frame(100, &frame(10.0));
        ingest.on_frame(200, &frame(20.0));

        let windows = ingest.snapshot(3);
        assert_eq!(windows.len(), CHANNEL_COUNT);
        assert_eq!(windows[0], vec![0.0, 10.0, 20.0]);
        assert_eq!(windows[7], vec![0.0, 17.0, 27.0]);
        assert_eq!(ingest.latest().map(|s| s.timestamp_us), Some(200));
    }

    #[test]
    fn test_malformed_frames_dropped_and_counted() {
        let ingest = EmgIngest::new(16).unwrap();
        ingest.on_frame(1, &[1.0; 7]);
        ingest.on_frame(2, &[1.0; 9]);

        let mut with_nan = frame(0.0);
        with_nan[3] = f32::NAN;
        ingest.on_frame(3, &with_nan);
        ingest.on_frame(4, &frame(1.0));

        let stats = ingest.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.dropped, 3);
        assert_eq!(ingest.snapshot(2)[0], vec![0.0, 1.0]);
    }

    #[test]
    fn test_record_reports_shape() {
        let ingest = EmgIngest::new(4).unwrap();
        assert_eq!(
            ingest.record(1, &[0.0; 3]),
            Err(DeviceFrameError::WrongChannelCount { expected: 8, actual: 3 })
        );
        let mut values = frame(0.0);
        values[5] = f32::INFINITY;
        assert_eq!(ingest.record(1, &values), Err(DeviceFrameError::NonFinite { channel: 5 }));
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let ingest = EmgIngest::new(4).unwrap();
        ingest.on_frame(1, &frame(1.0));
        let before = ingest.snapshot(2);
        ingest.on_frame(2, &frame(2.0));
        assert_eq!(before[0], vec![0.0, 1.0]);
        assert_eq!(ingest.snapshot(2)[0], vec![1.0, 2.0]);
    }
}
