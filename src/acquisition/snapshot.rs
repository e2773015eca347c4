// src/acquisition/snapshot.rs
//! Point-in-time copies of both buffer sets
//!
//! The EMG windows are copied under the EMG lock and the force windows
//! under the force lock, one after the other. Each half is self-consistent,
//! but the two halves come from independent device clocks and are only
//! aligned to the moment the snapshot was taken.

use serde::Serialize;
use std::sync::Arc;

use crate::acquisition::emg_ingest::EmgIngest;
use crate::acquisition::force_ingest::ForceIngest;
use crate::acquisition::ring_buffer::{RingBufferError, WindowLength};
use crate::config::constants::emg::CHANNEL_COUNT;
use crate::utils::time::{MonotonicTimeProvider, TimeProvider};

/// Detached per-channel windows, oldest value first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Snapshot clock, not either device's clock
    pub taken_at_us: u64,
    pub window: usize,
    pub emg: Vec<Vec<f32>>,
    pub force: Vec<Vec<f64>>,
}

impl Snapshot {
    /// Most recent value per EMG channel (zero before any data)
    pub fn latest_emg(&self) -> Vec<f32> {
        self.emg.iter().map(|w| w.last().copied().unwrap_or_default()).collect()
    }

    /// Most recent value per force channel (zero before any data)
    pub fn latest_force(&self) -> Vec<f64> {
        self.force.iter().map(|w| w.last().copied().unwrap_or_default()).collect()
    }

    pub fn taken_at_secs(&self) -> f64 {
        self.taken_at_us as f64 / 1_000_000.0
    }
}

/// Reader handle over both ingests with a window length checked once
#[derive(Clone)]
pub struct SynchronizedSnapshot {
    emg: Arc<EmgIngest>,
    force: Arc<ForceIngest>,
    window: WindowLength,
    clock: Arc<dyn TimeProvider>,
}

impl SynchronizedSnapshot {
    /// Fails when `window` exceeds either buffer's capacity
    pub fn new(emg: Arc<EmgIngest>, force: Arc<ForceIngest>, window: usize) -> Result<Self, RingBufferError> {
        let capacity = emg.capacity().min(force.capacity());
        let window = WindowLength::new(window, capacity)?;

        Ok(Self {
            emg,
            force,
            window,
            clock: Arc::new(MonotonicTimeProvider::new()),
        })
    }

    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn window(&self) -> usize {
        self.window.get()
    }

    pub fn take(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        self.take_into(&mut snapshot);
        snapshot
    }

    /// Refill `snapshot` in place, reusing its allocations
    pub fn take_into(&self, snapshot: &mut Snapshot) {
        let k = self.window.get();
        snapshot.window = k;
        snapshot.taken_at_us = self.clock.now_micros();

        snapshot.emg.resize_with(CHANNEL_COUNT, Vec::new);
        self.emg.snapshot_into(k, &mut snapshot.emg);

        snapshot.force.resize_with(self.force.channels(), Vec::new);
        self.force.snapshot_into(k, &mut snapshot.force);
    }
}
