use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    fn now_micros(&self) -> u64;

    fn now_secs(&self) -> f64 {
        self.now_micros() as f64 / 1_000_000.0
    }
}

/// Monotonic microseconds since the provider was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeProvider {
    origin: Instant,
}

impl MonotonicTimeProvider {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MonotonicTimeProvider {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Mock time provider for deterministic testing
#[derive(Debug, Default)]
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_micros: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_micros),
        }
    }

    pub fn advance_by(&self, micros: u64) {
        self.current_time.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn set_time(&self, micros: u64) {
        self.current_time.store(micros, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_micros(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}
