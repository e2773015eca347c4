// src/error.rs
//! Unified error handling for the acquisition core
//!
//! Errors are grouped by how far they are allowed to travel. Transport,
//! parse, device-frame and sink errors are contained inside the producer or
//! consumer loop that raised them and only surface as counters and log
//! lines. Configuration and calibration errors are the only ones allowed to
//! abort the process, and they can only happen at startup.

use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::config::calibration::CalibrationError;
use crate::config::loader::ConfigError;
use crate::scheduler::SchedulerError;

/// Serial link failures. Fatal to the force ingest loop only.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serial link disconnected: {0}")]
    Disconnected(String),

    #[error("no line received within {0:?}")]
    Timeout(Duration),

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A serial line that could not be turned into one reading per channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("line is not valid UTF-8")]
    NotUtf8,

    #[error("line of {len} bytes exceeds the {max}-byte limit")]
    TooLong { len: usize, max: usize },

    #[error("expected {expected} values, got {actual}")]
    WrongTokenCount { expected: usize, actual: usize },

    #[error("token {index} ({token:?}) is not an unsigned integer")]
    InvalidToken { index: usize, token: String },
}

/// A device frame with the wrong shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceFrameError {
    #[error("expected {expected} EMG channels, got {actual}")]
    WrongChannelCount { expected: usize, actual: usize },

    #[error("channel {channel} carries a non-finite value")]
    NonFinite { channel: usize },
}

/// Render or log sink failure. Isolated to the sink that raised it.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot shape mismatch: {0}")]
    Shape(String),

    #[error("sink is closed")]
    Closed,
}

/// Where an error was raised
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub thread_name: Option<String>,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            thread_name: std::thread::current().name().map(str::to_string),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.component, self.operation)?;
        if let (Some(file), Some(line)) = (self.file, self.line) {
            write!(f, " at {}:{}", file, line)?;
        }
        if let Some(thread) = &self.thread_name {
            write!(f, " on thread '{}'", thread)?;
        }
        Ok(())
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

/// Unified error type for the acquisition core
#[derive(Debug, Error)]
pub enum GripError {
    #[error("[TRANSPORT] {source} ({context})")]
    Transport {
        source: TransportError,
        context: ErrorContext,
    },

    #[error("[PARSE] {source} ({context})")]
    Parse {
        source: ParseError,
        context: ErrorContext,
    },

    #[error("[DEVICE] {source} ({context})")]
    DeviceFrame {
        source: DeviceFrameError,
        context: ErrorContext,
    },

    #[error("[CONFIG] {source} ({context})")]
    Configuration {
        source: ConfigError,
        context: ErrorContext,
    },

    #[error("[CALIBRATION] {source} ({context})")]
    Calibration {
        source: CalibrationError,
        context: ErrorContext,
    },

    #[error("[SINK:{sink}] {source} ({context})")]
    Sink {
        sink: String,
        source: SinkError,
        context: ErrorContext,
    },

    #[error("[SCHEDULER] {source} ({context})")]
    Scheduler {
        source: SchedulerError,
        context: ErrorContext,
    },
}

impl GripError {
    /// Errors that must stop the process before acquisition starts
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, GripError::Configuration { .. } | GripError::Calibration { .. })
    }

    /// Errors that are handled by dropping the offending input or output row
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GripError::Parse { .. } | GripError::DeviceFrame { .. } | GripError::Sink { .. }
        )
    }

    /// Context attached where the error was raised
    pub fn context(&self) -> &ErrorContext {
        match self {
            GripError::Transport { context, .. }
            | GripError::Parse { context, .. }
            | GripError::DeviceFrame { context, .. }
            | GripError::Configuration { context, .. }
            | GripError::Calibration { context, .. }
            | GripError::Sink { context, .. }
            | GripError::Scheduler { context, .. } => context,
        }
    }

    /// Wrap a sink failure, naming the sink
    pub fn sink(sink: &str, source: SinkError) -> Self {
        GripError::Sink {
            sink: sink.to_string(),
            source,
            context: error_context!("sinks", "write"),
        }
    }
}

impl From<TransportError> for GripError {
    fn from(source: TransportError) -> Self {
        GripError::Transport {
            source,
            context: error_context!("force_ingest", "read_line"),
        }
    }
}

impl From<ParseError> for GripError {
    fn from(source: ParseError) -> Self {
        GripError::Parse {
            source,
            context: error_context!("force_ingest", "parse_line"),
        }
    }
}

impl From<DeviceFrameError> for GripError {
    fn from(source: DeviceFrameError) -> Self {
        GripError::DeviceFrame {
            source,
            context: error_context!("emg_ingest", "on_frame"),
        }
    }
}

impl From<ConfigError> for GripError {
    fn from(source: ConfigError) -> Self {
        GripError::Configuration {
            source,
            context: error_context!("config", "load"),
        }
    }
}

impl From<CalibrationError> for GripError {
    fn from(source: CalibrationError) -> Self {
        GripError::Calibration {
            source,
            context: error_context!("calibration", "load"),
        }
    }
}

impl From<SchedulerError> for GripError {
    fn from(source: SchedulerError) -> Self {
        GripError::Scheduler {
            source,
            context: error_context!("scheduler", "spawn"),
        }
    }
}

/// Result type alias for core operations
pub type GripResult<T> = Result<T, GripError>;
