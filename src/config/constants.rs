// src/config/constants.rs
//! System-wide configuration constants

/// EMG armband constants
pub mod emg {
    /// Channels per device frame
    pub const CHANNEL_COUNT: usize = 8;
    /// Nominal streaming rate of the armband
    pub const DEFAULT_SIMULATED_RATE_HZ: u32 = 200;
    /// Raw EMG readings are signed 8-bit on the device
    pub const SIMULATED_AMPLITUDE: f32 = 100.0;
}

/// Force-sensing resistor board constants
pub mod force {
    pub const DEFAULT_CHANNEL_COUNT: usize = 5;
    pub const MAX_CHANNEL_COUNT: usize = 16;
    /// 10-bit ADC full scale
    pub const DEFAULT_ADC_MAX: u16 = 1023;
    pub const DEFAULT_VREF_VOLTS: f64 = 5.0;
    /// Grams to Newtons, as used by the manufacturer datasheet tables
    pub const GRAMS_TO_NEWTONS: f64 = 0.0098;
    pub const DEFAULT_SIMULATED_RATE_HZ: u32 = 100;
}

/// Buffering constants
pub mod buffer {
    pub const DEFAULT_CAPACITY: usize = 512;
    pub const DEFAULT_WINDOW_SAMPLES: usize = 512;
    pub const MAX_CAPACITY: usize = 1 << 20;
}

/// Serial link constants
pub mod serial {
    pub const DEFAULT_PORT_NAME: &str = "/dev/ttyACM0";
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
    pub const MAX_LINE_BYTES: usize = 256;
}

/// Consumer cadence constants
pub mod scheduler {
    pub const DEFAULT_RENDER_RATE_HZ: f64 = 30.0;
    pub const DEFAULT_LOG_RATE_HZ: f64 = 200.0;
    pub const MAX_RATE_HZ: f64 = 10_000.0;
    /// How often a waiting session checks for exited producers
    pub const SESSION_POLL_MS: u64 = 250;
    /// How often the interrupt listener checks whether the session already ended
    pub const INTERRUPT_POLL_MS: u64 = 100;
}

/// Sink behaviour constants
pub mod sinks {
    /// A failing sink logs its first failure and then every Nth one
    pub const FAILURE_LOG_INTERVAL: u64 = 1000;
    /// Summed |EMG| mapped onto the full force range
    pub const EMG_ACTIVITY_FULL_SCALE: f32 = 500.0;
}

/// File locations
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "grip.toml";
    pub const LOCAL_CONFIG_FILE: &str = "grip.local.toml";
    pub const DEFAULT_CALIBRATION_FILE: &str = "calibration.toml";
    pub const ENV_PREFIX: &str = "GRIP";
    pub const ENV_SEPARATOR: &str = "__";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_fits_default_capacity() {
        assert!(buffer::DEFAULT_WINDOW_SAMPLES <= buffer::DEFAULT_CAPACITY);
    }

    #[test]
    fn test_log_cadence_faster_than_render() {
        assert!(scheduler::DEFAULT_LOG_RATE_HZ > scheduler::DEFAULT_RENDER_RATE_HZ);
    }
}
