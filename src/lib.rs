//! Grip-Core: concurrent EMG and force sensor acquisition
//!
//! This library records two independent sensor streams side by side for
//! grip force estimation work:
//!
//! - An 8-channel EMG armband that pushes frames from its own driver thread
//! - An FSR board that sends comma-separated ADC readings over serial
//!
//! Each stream fills its own set of ring buffers behind its own lock.
//! Fixed-rate consumers take zero-padded snapshots of both sets and hand
//! them to render and log sinks. Raw ADC readings become Newtons through a
//! calibration model loaded once at startup.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use grip_core::acquisition::{EmgIngest, ForceIngest, SynchronizedSnapshot};
//! use grip_core::config::CalibrationModel;
//! use grip_core::hal::ScriptedTransport;
//! use grip_core::scheduler::StopSignal;
//! use grip_core::utils::ForceConverter;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = Arc::new(CalibrationModel::load("calibration.toml")?);
//!     let emg = Arc::new(EmgIngest::new(512)?);
//!     let force = Arc::new(ForceIngest::new(5, 512, ForceConverter::new(model))?);
//!
//!     let stop = StopSignal::new();
//!     let mut transport = ScriptedTransport::new(["709,0,12,1023,300"]);
//!     force.run(&mut transport, &stop.token());
//!
//!     let snapshot = SynchronizedSnapshot::new(emg, force, 64)?.take();
//!     println!("latest forces: {:?}", snapshot.latest_force());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod estimate;
pub mod hal;
pub mod scheduler;
pub mod sinks;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{
    ChannelBuffer, EmgIngest, ForceIngest, IngestExit, IngestStats, Sample, Snapshot, SynchronizedSnapshot,
};
pub use config::{CalibrationModel, ConfigLoader, SystemConfig};
pub use error::{GripError, GripResult};
pub use scheduler::{stop_on_interrupt, Scheduler, SessionEnd, StopSignal, StopToken};
pub use utils::{ForceConverter, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    let mut features = vec![
        "EMG push-callback ingest".to_string(),
        "All-or-nothing serial force ingest".to_string(),
        "Polynomial and table calibration".to_string(),
        "Fixed-rate snapshot scheduling".to_string(),
        "CSV dataset and raw force logs".to_string(),
    ];
    if cfg!(feature = "serial") {
        features.push("Serial port transport".to_string());
    }

    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Concurrent EMG and force sensor acquisition core".to_string(),
        features,
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
