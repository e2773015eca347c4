//! Common utility functions
//!
//! Timestamps for every recorded sample come from a [`TimeProvider`], so
//! tests can drive time by hand.

pub mod conversion;
pub mod time;

pub use conversion::ForceConverter;
pub use time::{MockTimeProvider, MonotonicTimeProvider, TimeProvider};
