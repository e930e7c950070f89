//! Sensor configuration loaded from JSON.
//!
//! ```json
//! {
//!   "readout": { "segmented": { "columns": 8, "rows": 8, "width": 49.0, "height": 49.0 } },
//!   "gain_file": "gains/h12700.dat",
//!   "spectral_response": "qe/h12700.dat"
//! }
//! ```
//!
//! `"readout": "continuous"` (the default) selects unsegmented reconstruction.
//! Relative paths are resolved against the directory of the config file.

use crate::error::{Error, Result};
use crate::grid::PixelGrid;
use crate::readout::{READOUT_COLUMNS, READOUT_ROWS};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Geometry of a segmented readout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentedConfig {
    pub columns: u16,
    pub rows: u16,
    /// Active-area width (same length unit as hit positions).
    pub width: f64,
    /// Active-area height.
    pub height: f64,
}

impl SegmentedConfig {
    /// Builds the pixel grid described by this configuration.
    ///
    /// # Errors
    /// Same conditions as [`PixelGrid::new`].
    pub fn grid(&self) -> Result<PixelGrid> {
        PixelGrid::new(self.columns, self.rows, self.width, self.height)
    }
}

/// Position reconstruction mode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadoutConfig {
    #[default]
    Continuous,
    Segmented(SegmentedConfig),
}

/// Configuration of one sensor (detector element).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub readout: ReadoutConfig,
    /// Per-pixel gain file; segmented readout only.
    pub gain_file: Option<PathBuf>,
    /// Spectral response table handed to the response model.
    pub spectral_response: Option<PathBuf>,
}

impl SensorConfig {
    /// Continuous readout without calibration files.
    #[must_use]
    pub fn continuous() -> Self {
        Self::default()
    }

    /// Segmented readout without calibration files.
    #[must_use]
    pub fn segmented(columns: u16, rows: u16, width: f64, height: f64) -> Self {
        Self {
            readout: ReadoutConfig::Segmented(SegmentedConfig {
                columns,
                rows,
                width,
                height,
            }),
            ..Self::default()
        }
    }

    /// Sets the gain file.
    #[must_use]
    pub fn with_gain_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.gain_file = Some(path.into());
        self
    }

    /// Sets the spectral response file.
    #[must_use]
    pub fn with_spectral_response<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.spectral_response = Some(path.into());
        self
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed, or if it does not validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut config: Self = serde_json::from_reader(BufReader::new(file))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration string.
    ///
    /// # Errors
    /// Fails on invalid JSON or if the configuration does not validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the grid geometry and that gains are only given for a
    /// segmented readout.
    ///
    /// # Errors
    /// Returns the grid construction error or [`Error::InvalidConfig`].
    pub fn validate(&self) -> Result<()> {
        match &self.readout {
            ReadoutConfig::Segmented(segmented) => {
                segmented.grid()?;
            }
            ReadoutConfig::Continuous => {
                if self.gain_file.is_some() {
                    return Err(Error::InvalidConfig(
                        "gain_file requires a segmented readout".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Whether the readout geometry matches the charge-division anode table.
    #[must_use]
    pub fn supports_charge_division(&self) -> bool {
        match self.readout {
            ReadoutConfig::Segmented(segmented) => {
                usize::from(segmented.columns) == READOUT_COLUMNS
                    && usize::from(segmented.rows) == READOUT_ROWS
            }
            ReadoutConfig::Continuous => false,
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.gain_file, &mut self.spectral_response]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_is_continuous() {
        let config = SensorConfig::from_json("{}").unwrap();
        assert_eq!(config.readout, ReadoutConfig::Continuous);
        assert!(config.gain_file.is_none());

        let config = SensorConfig::from_json(r#"{"readout": "continuous"}"#).unwrap();
        assert_eq!(config, SensorConfig::continuous());
    }

    #[test]
    fn test_segmented_json() {
        let json = r#"{
            "readout": {"segmented": {"columns": 8, "rows": 8, "width": 80.0, "height": 80.0}},
            "gain_file": "gains.txt"
        }"#;
        let config = SensorConfig::from_json(json).unwrap();
        assert_eq!(
            config,
            SensorConfig::segmented(8, 8, 80.0, 80.0).with_gain_file("gains.txt")
        );
    }

    #[test]
    fn test_validation_errors() {
        let zero = r#"{"readout": {"segmented": {"columns": 0, "rows": 8, "width": 80.0, "height": 80.0}}}"#;
        assert!(matches!(
            SensorConfig::from_json(zero),
            Err(Error::EmptyGrid { .. })
        ));

        let gains_without_grid = r#"{"gain_file": "gains.txt"}"#;
        assert!(matches!(
            SensorConfig::from_json(gains_without_grid),
            Err(Error::InvalidConfig(_))
        ));

        assert!(matches!(
            SensorConfig::from_json("{not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_supports_charge_division() {
        assert!(!SensorConfig::continuous().supports_charge_division());
        assert!(!SensorConfig::segmented(4, 8, 49.0, 49.0).supports_charge_division());
        assert!(SensorConfig::segmented(8, 8, 49.0, 49.0).supports_charge_division());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"spectral_response": "qe.txt", "gain_file": "/abs/gains.txt",
                "readout": {{"segmented": {{"columns": 2, "rows": 2, "width": 4.0, "height": 4.0}}}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = SensorConfig::from_file(file.path()).unwrap();
        let base = file.path().parent().unwrap();
        assert_eq!(config.spectral_response, Some(base.join("qe.txt")));
        assert_eq!(config.gain_file, Some(PathBuf::from("/abs/gains.txt")));
    }
}
