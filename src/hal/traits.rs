// src/hal/traits.rs
//! Ports between the acquisition core and its hardware collaborators

use thiserror::Error;

use crate::error::TransportError;

/// Failure reported by the EMG device when it rejects a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device command '{command}' failed: {reason}")]
pub struct DeviceCommandError {
    pub command: &'static str,
    pub reason: String,
}

/// Commands the core may issue back to a connected EMG device
pub trait EmgStreamControl {
    /// Enable or disable EMG streaming
    fn stream_emg(&mut self, enabled: bool) -> Result<(), DeviceCommandError>;
}

/// Inbound port for the EMG device's push callbacks.
///
/// The device driver calls these from its own thread. `on_frame` must
/// return quickly, since later callbacks queue behind it.
pub trait EmgListener: Send + Sync {
    /// A device paired; the listener decides whether to start streaming
    fn on_connected(&self, device: &mut dyn EmgStreamControl);

    fn on_disconnected(&self) {}

    /// One timestamped frame, one value per EMG channel
    fn on_frame(&self, timestamp_us: u64, values: &[f32]);
}

/// Line-oriented transport to the force sensor board
pub trait LineTransport: Send {
    /// Block until one line arrives and store it in `buf` without its
    /// terminator. Any error ends the ingest loop.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError>;

    /// Human-readable endpoint name for logs
    fn describe(&self) -> String;
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        (**self).read_line(buf)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
