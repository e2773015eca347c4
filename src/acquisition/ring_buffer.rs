// src/acquisition/ring_buffer.rs
//! Fixed-capacity sample history for one channel
//!
//! `ChannelBuffer` is a plain single-owner ring: it does no locking of its
//! own. Every buffer lives behind the lock of the ingest that owns it, and
//! readers copy out of it while holding that same lock.

use std::mem;
use thiserror::Error;

/// Ring buffer error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    #[error("invalid buffer capacity {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("window of {window} samples exceeds buffer capacity {capacity}")]
    WindowTooLarge { window: usize, capacity: usize },

    #[error("a buffer set needs at least one channel")]
    NoChannels,
}

/// One recorded value. Immutable once pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T> {
    /// Microseconds on the producer's clock
    pub timestamp_us: u64,
    pub value: T,
}

impl<T> Sample<T> {
    pub fn new(timestamp_us: u64, value: T) -> Self {
        Self { timestamp_us, value }
    }
}

/// Window length checked against a buffer capacity once, up front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLength(usize);

impl WindowLength {
    pub fn new(window: usize, capacity: usize) -> Result<Self, RingBufferError> {
        if window > capacity {
            return Err(RingBufferError::WindowTooLarge { window, capacity });
        }
        Ok(Self(window))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Append-only ring that evicts its oldest sample once full
#[derive(Debug, Clone)]
pub struct ChannelBuffer<T> {
    slots: Vec<Sample<T>>,
    capacity: usize,
    /// Index of the oldest sample once the ring has wrapped
    start: usize,
    total_pushed: u64,
}

impl<T> ChannelBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::InvalidCapacity(capacity));
        }

        Ok(Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            start: 0,
            total_pushed: 0,
        })
    }

    /// Append a sample in O(1), returning the evicted one when full
    pub fn push(&mut self, sample: Sample<T>) -> Option<Sample<T>> {
        self.total_pushed += 1;

        if self.slots.len() < self.capacity {
            self.slots.push(sample);
            return None;
        }

        let evicted = mem::replace(&mut self.slots[self.start], sample);
        self.start = (self.start + 1) % self.capacity;
        Some(evicted)
    }

    /// Samples oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample<T>> + '_ {
        let (wrapped, head) = self.slots.split_at(self.start);
        head.iter().chain(wrapped.iter())
    }

    /// The most recent `min(k, len)` samples, oldest first
    pub fn recent(&self, k: usize) -> impl Iterator<Item = &Sample<T>> + '_ {
        self.iter().skip(self.len().saturating_sub(k))
    }

    pub fn latest(&self) -> Option<&Sample<T>> {
        self.iter().next_back()
    }

    pub fn oldest(&self) -> Option<&Sample<T>> {
        self.iter().next()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes over the buffer lifetime, including evicted ones
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Current utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f32 {
        self.slots.len() as f32 / self.capacity as f32
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.start = 0;
    }
}

impl<T: Copy + Default> ChannelBuffer<T> {
    /// Exactly `k` values, oldest first, left-padded with `T::default()`
    /// when fewer than `k` samples have been recorded
    pub fn window(&self, k: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(k);
        self.window_into(k, &mut out);
        out
    }

    /// Like [`window`](Self::window) but appends to a caller-owned vector
    pub fn window_into(&self, k: usize, out: &mut Vec<T>) {
        let available = self.len().min(k);
        out.extend(std::iter::repeat(T::default()).take(k - available));
        out.extend(self.recent(k).map(|sample| sample.value));
    }
}
