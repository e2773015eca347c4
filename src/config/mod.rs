// src/config/mod.rs
//! Configuration management

pub mod calibration;
pub mod constants;
pub mod loader;

pub use calibration::{CalibrationError, CalibrationModel, InterpolationTable, PolynomialCoefficients};
pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub force: ForceConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub emg: EmgConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// Buffer sizing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AcquisitionConfig {
    #[serde(default = "defaults::buffer_capacity")]
    pub buffer_capacity: usize,

    /// Samples per channel handed to each consumer tick
    #[serde(default = "defaults::window_samples")]
    pub window_samples: usize,

    #[serde(default = "defaults::force_channels")]
    pub force_channels: usize,
}

/// Analog front end of the FSR board
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ForceConfig {
    #[serde(default = "defaults::vref")]
    pub vref: f64,

    #[serde(default = "defaults::adc_max")]
    pub adc_max: u16,

    /// Mirror every committed reading to this file
    #[serde(default)]
    pub raw_log_path: Option<PathBuf>,
}

/// Serial link to the FSR board
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "defaults::port_name")]
    pub port_name: String,

    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Replace the board with a simulated line source
    #[serde(default)]
    pub simulate: bool,

    #[serde(default = "defaults::simulated_force_rate_hz")]
    pub simulated_rate_hz: u32,
}

/// EMG armband
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmgConfig {
    #[serde(default = "defaults::simulate_emg")]
    pub simulate: bool,

    #[serde(default = "defaults::simulated_emg_rate_hz")]
    pub simulated_rate_hz: u32,
}

/// Consumer cadences
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SchedulerConfig {
    #[serde(default = "defaults::render_rate_hz")]
    pub render_rate_hz: f64,

    #[serde(default = "defaults::log_rate_hz")]
    pub log_rate_hz: f64,
}

/// Dataset log
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CalibrationConfig {
    #[serde(default = "defaults::calibration_path")]
    pub path: PathBuf,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use std::path::PathBuf;

    pub fn buffer_capacity() -> usize { buffer::DEFAULT_CAPACITY }
    pub fn window_samples() -> usize { buffer::DEFAULT_WINDOW_SAMPLES }
    pub fn force_channels() -> usize { force::DEFAULT_CHANNEL_COUNT }

    pub fn vref() -> f64 { force::DEFAULT_VREF_VOLTS }
    pub fn adc_max() -> u16 { force::DEFAULT_ADC_MAX }

    pub fn port_name() -> String { serial::DEFAULT_PORT_NAME.to_string() }
    pub fn baud_rate() -> u32 { serial::DEFAULT_BAUD_RATE }
    pub fn timeout_ms() -> u64 { serial::DEFAULT_TIMEOUT_MS }
    pub fn simulated_force_rate_hz() -> u32 { force::DEFAULT_SIMULATED_RATE_HZ }

    pub fn simulate_emg() -> bool { true }
    pub fn simulated_emg_rate_hz() -> u32 { emg::DEFAULT_SIMULATED_RATE_HZ }

    pub fn render_rate_hz() -> f64 { scheduler::DEFAULT_RENDER_RATE_HZ }
    pub fn log_rate_hz() -> f64 { scheduler::DEFAULT_LOG_RATE_HZ }

    pub fn calibration_path() -> PathBuf { PathBuf::from(paths::DEFAULT_CALIBRATION_FILE) }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: defaults::buffer_capacity(),
            window_samples: defaults::window_samples(),
            force_channels: defaults::force_channels(),
        }
    }
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            vref: defaults::vref(),
            adc_max: defaults::adc_max(),
            raw_log_path: None,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: defaults::port_name(),
            baud_rate: defaults::baud_rate(),
            timeout_ms: defaults::timeout_ms(),
            simulate: false,
            simulated_rate_hz: defaults::simulated_force_rate_hz(),
        }
    }
}

impl Default for EmgConfig {
    fn default() -> Self {
        Self {
            simulate: defaults::simulate_emg(),
            simulated_rate_hz: defaults::simulated_emg_rate_hz(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            render_rate_hz: defaults::render_rate_hz(),
            log_rate_hz: defaults::log_rate_hz(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: defaults::calibration_path(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SystemConfig {
    /// Validate configuration consistency, collecting every violation
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let acquisition = &self.acquisition;

        if acquisition.buffer_capacity == 0 || acquisition.buffer_capacity > buffer::MAX_CAPACITY {
            errors.push(format!(
                "buffer_capacity must be in 1..={}, got {}",
                buffer::MAX_CAPACITY,
                acquisition.buffer_capacity
            ));
        }

        if acquisition.window_samples > acquisition.buffer_capacity {
            errors.push(format!(
                "window_samples ({}) exceeds buffer_capacity ({})",
                acquisition.window_samples, acquisition.buffer_capacity
            ));
        }

        if acquisition.force_channels == 0 || acquisition.force_channels > force::MAX_CHANNEL_COUNT {
            errors.push(format!(
                "force_channels must be in 1..={}, got {}",
                force::MAX_CHANNEL_COUNT,
                acquisition.force_channels
            ));
        }

        if !(self.force.vref.is_finite() && self.force.vref > 0.0) {
            errors.push(format!("vref must be a positive voltage, got {}", self.force.vref));
        }

        if self.force.adc_max == 0 {
            errors.push("adc_max must be greater than 0".to_string());
        }

        if !self.serial.simulate {
            if self.serial.port_name.is_empty() {
                errors.push("serial port_name cannot be empty".to_string());
            }
            if self.serial.baud_rate == 0 {
                errors.push("serial baud_rate must be greater than 0".to_string());
            }
        }

        if self.serial.timeout_ms == 0 {
            errors.push("serial timeout_ms must be greater than 0".to_string());
        }

        for (name, rate) in [
            ("render_rate_hz", self.scheduler.render_rate_hz),
            ("log_rate_hz", self.scheduler.log_rate_hz),
        ] {
            if !(rate.is_finite() && rate > 0.0 && rate <= scheduler::MAX_RATE_HZ) {
                errors.push(format!(
                    "{} must be in (0, {}], got {}",
                    name,
                    scheduler::MAX_RATE_HZ,
                    rate
                ));
            }
        }

        if self.emg.simulate && self.emg.simulated_rate_hz == 0 {
            errors.push("emg simulated_rate_hz must be greater than 0".to_string());
        }

        if self.serial.simulate && self.serial.simulated_rate_hz == 0 {
            errors.push("serial simulated_rate_hz must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get configuration summary
    pub fn get_summary(&self) -> ConfigSummary {
        ConfigSummary {
            buffer_capacity: self.acquisition.buffer_capacity,
            window_samples: self.acquisition.window_samples,
            force_channels: self.acquisition.force_channels,
            render_rate_hz: self.scheduler.render_rate_hz,
            log_rate_hz: self.scheduler.log_rate_hz,
            simulated_emg: self.emg.simulate,
            simulated_force: self.serial.simulate,
        }
    }
}

/// Configuration summary for display/logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub buffer_capacity: usize,
    pub window_samples: usize,
    pub force_channels: usize,
    pub render_rate_hz: f64,
    pub log_rate_hz: f64,
    pub simulated_emg: bool,
    pub simulated_force: bool,
}
