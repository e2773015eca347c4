// src/config/calibration.rs
//! Voltage to force calibration models
//!
//! Coefficients are fitted offline against the sensor datasheet and handed
//! to the acquisition core as an immutable file. Two shapes are accepted:
//!
//! ```toml
//! [polynomial]      # force = a*v^3 + b*v^2 + c*v + d, in Newtons
//! a = 0.52
//! b = -1.9
//! c = 4.1
//! d = -0.3
//! ```
//!
//! ```toml
//! [table]           # piecewise linear, extrapolated past both ends
//! voltages = [0.2, 1.0, 2.5, 4.0]
//! forces = [0.1, 1.2, 5.0, 14.0]
//! ```
//!
//! A `.csv` file with a header row and `force_grams,voltage` columns (the
//! digitised manufacturer curve) is also accepted and becomes a table.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::constants::force::GRAMS_TO_NEWTONS;

/// Calibration loading failures. Always fatal at startup.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read calibration data: {0}")]
    Io(#[from] std::io::Error),

    #[error("calibration parse error: {0}")]
    Parse(String),

    #[error("calibration file defines neither [polynomial] nor [table]")]
    MissingModel,

    #[error("calibration file defines both [polynomial] and [table]")]
    AmbiguousModel,

    #[error("calibration value '{0}' is not finite")]
    NonFinite(&'static str),

    #[error("interpolation table needs at least 2 points, got {0}")]
    TableTooShort(usize),

    #[error("table has {voltages} voltages but {forces} forces")]
    LengthMismatch { voltages: usize, forces: usize },

    #[error("table voltages must be strictly increasing (index {0})")]
    NonIncreasingVoltage(usize),

    #[error("unsupported calibration file extension: {0}")]
    UnsupportedFormat(String),
}

impl From<toml::de::Error> for CalibrationError {
    fn from(err: toml::de::Error) -> Self {
        CalibrationError::Parse(err.to_string())
    }
}

impl From<csv::Error> for CalibrationError {
    fn from(err: csv::Error) -> Self {
        CalibrationError::Parse(err.to_string())
    }
}

/// Cubic fit coefficients, highest power first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolynomialCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl PolynomialCoefficients {
    fn validate(&self) -> Result<(), CalibrationError> {
        for (name, value) in [("a", self.a), ("b", self.b), ("c", self.c), ("d", self.d)] {
            if !value.is_finite() {
                return Err(CalibrationError::NonFinite(name));
            }
        }
        Ok(())
    }

    /// Horner evaluation of `a*v^3 + b*v^2 + c*v + d`
    pub fn evaluate(&self, voltage: f64) -> f64 {
        ((self.a * voltage + self.b) * voltage + self.c) * voltage + self.d
    }
}

/// Validated voltage/force lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationTable {
    voltages: Vec<f64>,
    forces: Vec<f64>,
}

impl InterpolationTable {
    /// Build a table, rejecting anything that would make interpolation undefined
    pub fn new(voltages: Vec<f64>, forces: Vec<f64>) -> Result<Self, CalibrationError> {
        if voltages.len() != forces.len() {
            return Err(CalibrationError::LengthMismatch {
                voltages: voltages.len(),
                forces: forces.len(),
            });
        }
        if voltages.len() < 2 {
            return Err(CalibrationError::TableTooShort(voltages.len()));
        }
        if voltages.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("voltages"));
        }
        if forces.iter().any(|f| !f.is_finite()) {
            return Err(CalibrationError::NonFinite("forces"));
        }
        if let Some(index) = voltages.windows(2).position(|w| w[1] <= w[0]) {
            return Err(CalibrationError::NonIncreasingVoltage(index + 1));
        }

        Ok(Self { voltages, forces })
    }

    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    /// Voltage range covered by measured points
    pub fn voltage_range(&self) -> (f64, f64) {
        (self.voltages[0], self.voltages[self.voltages.len() - 1])
    }

    /// Piecewise linear interpolation; the first and last segments extend
    /// past the table ends.
    pub fn evaluate(&self, voltage: f64) -> f64 {
        let n = self.voltages.len();
        let upper = self
            .voltages
            .partition_point(|&v| v <= voltage)
            .clamp(1, n - 1);
        let lower = upper - 1;

        let (v0, v1) = (self.voltages[lower], self.voltages[upper]);
        let (f0, f1) = (self.forces[lower], self.forces[upper]);
        f0 + (voltage - v0) * (f1 - f0) / (v1 - v0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableSection {
    voltages: Vec<f64>,
    forces: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CalibrationFile {
    polynomial: Option<PolynomialCoefficients>,
    table: Option<TableSection>,
}

#[derive(Debug, Deserialize)]
struct ManufacturerRow {
    force_grams: f64,
    voltage: f64,
}

/// Immutable voltage to force mapping, shared read-only by every ingest
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationModel {
    Polynomial(PolynomialCoefficients),
    Table(InterpolationTable),
}

impl CalibrationModel {
    /// Load a calibration file, choosing the format by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CalibrationError::FileNotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let model = match extension.as_str() {
            "toml" => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            "csv" => Self::from_manufacturer_csv(std::fs::File::open(path)?)?,
            other => return Err(CalibrationError::UnsupportedFormat(other.to_string())),
        };

        info!(path = %path.display(), kind = model.kind(), "calibration loaded");
        Ok(model)
    }

    /// Parse the TOML calibration format
    pub fn from_toml_str(content: &str) -> Result<Self, CalibrationError> {
        let file: CalibrationFile = toml::from_str(content)?;

        match (file.polynomial, file.table) {
            (Some(_), Some(_)) => Err(CalibrationError::AmbiguousModel),
            (None, None) => Err(CalibrationError::MissingModel),
            (Some(coefficients), None) => {
                coefficients.validate()?;
                Ok(CalibrationModel::Polynomial(coefficients))
            }
            (None, Some(table)) => Ok(CalibrationModel::Table(InterpolationTable::new(
                table.voltages,
                table.forces,
            )?)),
        }
    }

    /// Read a digitised datasheet curve, converting grams to Newtons.
    /// Rows are sorted by voltage before the table is validated.
    pub fn from_manufacturer_csv<R: Read>(reader: R) -> Result<Self, CalibrationError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut points = Vec::new();
        for record in csv_reader.deserialize::<ManufacturerRow>() {
            let row = record?;
            points.push((row.voltage, row.force_grams * GRAMS_TO_NEWTONS));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (voltages, forces) = points.into_iter().unzip();
        Ok(CalibrationModel::Table(InterpolationTable::new(voltages, forces)?))
    }

    /// Raw model output, before clamping
    pub fn evaluate(&self, voltage: f64) -> f64 {
        match self {
            CalibrationModel::Polynomial(coefficients) => coefficients.evaluate(voltage),
            CalibrationModel::Table(table) => table.evaluate(voltage),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CalibrationModel::Polynomial(_) => "polynomial",
            CalibrationModel::Table(_) => "table",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_polynomial_from_toml() {
        let model = CalibrationModel::from_toml_str(
            "[polynomial]\na = 1.0\nb = 0.0\nc = 0.0\nd = -1.0\n",
        )
        .unwrap();

        assert_eq!(model.kind(), "polynomial");
        assert!((model.evaluate(2.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_table_interpolates_and_extrapolates() {
        let model = CalibrationModel::from_toml_str(
            "[table]\nvoltages = [1.0, 2.0, 4.0]\nforces = [0.0, 10.0, 20.0]\n",
        )
        .unwrap();

        assert!((model.evaluate(1.5) - 5.0).abs() < 1e-12);
        assert!((model.evaluate(3.0) - 15.0).abs() < 1e-12);
        // Past the ends the outer segments continue
        assert!((model.evaluate(5.0) - 25.0).abs() < 1e-12);
        assert!((model.evaluate(0.0) + 10.0).abs() < 1e-12);
        // Exactly on a knot
        assert!((model.evaluate(2.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_and_ambiguous_models_rejected() {
        assert!(matches!(
            CalibrationModel::from_toml_str(""),
            Err(CalibrationError::MissingModel)
        ));

        let both = "[polynomial]\na = 1.0\nb = 1.0\nc = 1.0\nd = 1.0\n\
                    [table]\nvoltages = [0.0, 1.0]\nforces = [0.0, 1.0]\n";
        assert!(matches!(
            CalibrationModel::from_toml_str(both),
            Err(CalibrationError::AmbiguousModel)
        ));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        // Missing coefficient
        assert!(matches!(
            CalibrationModel::from_toml_str("[polynomial]\na = 1.0\nb = 1.0\nc = 1.0\n"),
            Err(CalibrationError::Parse(_))
        ));
        // Unknown section
        assert!(matches!(
            CalibrationModel::from_toml_str("[spline]\nknots = 3\n"),
            Err(CalibrationError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_tables_rejected() {
        assert!(matches!(
            InterpolationTable::new(vec![1.0], vec![1.0]),
            Err(CalibrationError::TableTooShort(1))
        ));
        assert!(matches!(
            InterpolationTable::new(vec![1.0, 2.0], vec![1.0]),
            Err(CalibrationError::LengthMismatch { voltages: 2, forces: 1 })
        ));
        assert!(matches!(
            InterpolationTable::new(vec![1.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]),
            Err(CalibrationError::NonIncreasingVoltage(1))
        ));
        assert!(matches!(
            InterpolationTable::new(vec![0.0, f64::NAN], vec![0.0, 1.0]),
            Err(CalibrationError::NonFinite("voltages"))
        ));
    }

    #[test]
    fn test_manufacturer_csv_converts_grams() {
        let csv = "force_grams,voltage\n1000,3.0\n100,1.0\n";
        let model = CalibrationModel::from_manufacturer_csv(csv.as_bytes()).unwrap();

        match &model {
            CalibrationModel::Table(table) => {
                assert_eq!(table.len(), 2);
                assert_eq!(table.voltage_range(), (1.0, 3.0));
            }
            other => panic!("expected table, got {:?}", other),
        }
        assert!((model.evaluate(3.0) - 9.8).abs() < 1e-9);
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[polynomial]\na = 0.0\nb = 0.0\nc = 2.0\nd = 0.0").unwrap();

        let model = CalibrationModel::load(file.path()).unwrap();
        assert!((model.evaluate(1.5) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_missing_file() {
        let result = CalibrationModel::load("/definitely/not/here/calibration.toml");
        assert!(matches!(result, Err(CalibrationError::FileNotFound(_))));
    }

    #[test]
    fn test_load_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".pkl").tempfile().unwrap();
        let result = CalibrationModel::load(file.path());
        assert!(matches!(result, Err(CalibrationError::UnsupportedFormat(ext)) if ext == "pkl"));
    }
}
