//! ADC reading to force conversion
//!
//! A raw reading is first normalised to the sensor voltage using the
//! board's reference voltage and ADC full scale, then passed through the
//! calibration model. Negative model output (noise around zero load) is
//! clamped to zero.
//!
//! Readings above full scale are not rejected; they map to voltages above
//! `vref` and the model extrapolates.

use std::sync::Arc;

use crate::config::calibration::CalibrationModel;
use crate::config::constants::force::{DEFAULT_ADC_MAX, DEFAULT_VREF_VOLTS};

/// Pure voltage to force mapping over a shared calibration model
#[derive(Debug, Clone)]
pub struct ForceConverter {
    model: Arc<CalibrationModel>,
    vref: f64,
    adc_max: f64,
}

impl ForceConverter {
    /// Converter for a 10-bit ADC referenced to 5 V
    pub fn new(model: Arc<CalibrationModel>) -> Self {
        Self::with_reference(model, DEFAULT_VREF_VOLTS, DEFAULT_ADC_MAX)
    }

    /// Converter for a custom analog front end. `adc_max` of 0 is treated as 1.
    pub fn with_reference(model: Arc<CalibrationModel>, vref: f64, adc_max: u16) -> Self {
        Self {
            model,
            vref,
            adc_max: f64::from(adc_max.max(1)),
        }
    }

    /// `raw / adc_max * vref`
    #[inline]
    pub fn raw_to_voltage(&self, raw: u32) -> f64 {
        f64::from(raw) / self.adc_max * self.vref
    }

    /// Model output at `voltage`, never negative
    #[inline]
    pub fn voltage_to_force(&self, voltage: f64) -> f64 {
        // f64::max also maps NaN to 0
        self.model.evaluate(voltage).max(0.0)
    }

    /// Force in Newtons for one raw ADC reading
    #[inline]
    pub fn convert(&self, raw: u32) -> f64 {
        self.voltage_to_force(self.raw_to_voltage(raw))
    }

    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    pub fn vref(&self) -> f64 {
        self.vref
    }
}
