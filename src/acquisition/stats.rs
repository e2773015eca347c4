// src/acquisition/stats.rs
//! Lock-free ingest counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

const NO_SAMPLE: u64 = u64::MAX;

/// Counters shared between a producer thread and any observer
#[derive(Debug)]
pub struct IngestCounters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    log_failures: AtomicU64,
    first_sample_us: AtomicU64,
    last_sample_us: AtomicU64,
}

/// Point-in-time copy of [`IngestCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub dropped: u64,
    pub log_failures: u64,
    pub first_sample_us: Option<u64>,
    pub last_sample_us: Option<u64>,
}

impl Default for IngestCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestCounters {
    pub fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            log_failures: AtomicU64::new(0),
            first_sample_us: AtomicU64::new(NO_SAMPLE),
            last_sample_us: AtomicU64::new(NO_SAMPLE),
        }
    }

    /// Count one committed sample stamped `timestamp_us`
    pub fn record_accepted(&self, timestamp_us: u64) {
        let _ = self.first_sample_us.compare_exchange(
            NO_SAMPLE,
            timestamp_us,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
        self.last_sample_us.store(timestamp_us, Ordering::Relaxed);
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one discarded input, returning the new total
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one failed log write, returning the new total
    pub fn record_log_failure(&self) -> u64 {
        self.log_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> IngestStats {
        let optional = |value: u64| (value != NO_SAMPLE).then_some(value);

        IngestStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            log_failures: self.log_failures.load(Ordering::Relaxed),
            first_sample_us: optional(self.first_sample_us.load(Ordering::Relaxed)),
            last_sample_us: optional(self.last_sample_us.load(Ordering::Relaxed)),
        }
    }
}

impl IngestStats {
    /// Observed sample rate between the first and last accepted samples.
    /// Zero until two samples with distinct timestamps have arrived.
    pub fn estimated_rate_hz(&self) -> f64 {
        match (self.first_sample_us, self.last_sample_us) {
            (Some(first), Some(last)) if last > first && self.accepted >= 2 => {
                (self.accepted - 1) as f64 / ((last - first) as f64 / 1_000_000.0)
            }
            _ => 0.0,
        }
    }

    /// Fraction of inputs that were discarded
    pub fn drop_ratio(&self) -> f64 {
        let total = self.accepted + self.dropped;
        if total == 0 {
            0.0
        } else {
            self.dropped as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_counters() {
        let stats = IngestCounters::new().snapshot();
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.first_sample_us, None);
        assert_eq!(stats.estimated_rate_hz(), 0.0);
        assert_eq!(stats.drop_ratio(), 0.0);
    }

    #[test]
    fn test_rate_estimate() {
        let counters = IngestCounters::new();
        // 201 samples, 5 ms apart, over exactly one second
        for i in 0..=200u64 {
            counters.record_accepted(1_000_000 + i * 5_000);
        }

        let stats = counters.snapshot();
        assert_eq!(stats.first_sample_us, Some(1_000_000));
        assert_eq!(stats.last_sample_us, Some(2_000_000));
        assert!((stats.estimated_rate_hz() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_accounting() {
        let counters = IngestCounters::new();
        counters.record_accepted(10);
        assert_eq!(counters.record_dropped(), 1);
        assert_eq!(counters.record_dropped(), 2);
        assert_eq!(counters.record_log_failure(), 1);

        let stats = counters.snapshot();
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.log_failures, 1);
        assert!((stats.drop_ratio() - 2.0 / 3.0).abs() < 1e-12);
    }
}
