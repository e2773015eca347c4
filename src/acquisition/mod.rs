// src/acquisition/mod.rs
//! Signal acquisition and buffering components

pub mod emg_ingest;
pub mod force_ingest;
pub mod ring_buffer;
pub mod snapshot;
pub mod stats;

pub use emg_ingest::{EmgFrame, EmgIngest};
pub use force_ingest::{parse_line, CommittedReading, ForceIngest, IngestExit, IngestState};
pub use ring_buffer::{ChannelBuffer, RingBufferError, Sample, WindowLength};
pub use snapshot::{Snapshot, SynchronizedSnapshot};
pub use stats::{IngestCounters, IngestStats};
