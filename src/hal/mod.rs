// src/hal/mod.rs
//! Hardware collaborators: EMG device and force board transports

pub mod serial_transport;
pub mod simulator;
pub mod traits;

pub use serial_transport::ReaderTransport;
#[cfg(feature = "serial")]
pub use serial_transport::SerialLineTransport;
pub use simulator::{ScriptedTransport, SimulatedEmgDevice, SimulatedForceBoard};
pub use traits::*;
