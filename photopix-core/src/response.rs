//! Spectral/pulse response of the photosensor.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
//!
//! The accumulator treats the response model as an opaque sink: it clears it
//! whenever its own state resets and hands it exactly one photon per accepted
//! hit. [`SpectralTrace`] is a simple reference sink that weights each photon
//! by a tabulated quantum efficiency and keeps the weighted arrivals.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Sink for accepted photons.
pub trait ResponseModel {
    /// Drops all photons of the current event.
    fn clear(&mut self);

    /// Adds a photon at full gain.
    fn add_photon(&mut self, time: f64, wavelength: f64) {
        self.add_photon_with_gain(time, wavelength, 1.0);
    }

    /// Adds a photon scaled by a gain fraction.
    fn add_photon_with_gain(&mut self, time: f64, wavelength: f64, gain: f64);

    /// Loads a spectral response calibration from a file.
    ///
    /// # Errors
    /// Implementation defined; the accumulator only propagates the result.
    fn load_spectral_response(&mut self, path: &Path) -> Result<()>;
}

/// Quantum efficiency as a function of wavelength.
///
/// Piecewise linear between tabulated points and zero outside them.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralTable {
    wavelengths: Vec<f64>,
    efficiencies: Vec<f64>,
}

impl SpectralTable {
    /// Builds a table from paired wavelengths (nm) and efficiencies.
    ///
    /// # Errors
    /// Fails on mismatched or empty inputs, non-ascending wavelengths, or an
    /// efficiency outside `[0, 1]`.
    pub fn from_table(wavelengths: Vec<f64>, efficiencies: Vec<f64>) -> Result<Self> {
        if wavelengths.len() != efficiencies.len() {
            return Err(Error::SpectralResponse(format!(
                "{} wavelengths but {} efficiencies",
                wavelengths.len(),
                efficiencies.len()
            )));
        }
        if wavelengths.len() < 2 {
            return Err(Error::SpectralResponse(
                "table needs at least two points".to_string(),
            ));
        }
        if wavelengths.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::SpectralResponse(
                "wavelengths must be strictly ascending".to_string(),
            ));
        }
        if let Some(bad) = efficiencies.iter().find(|e| !(0.0..=1.0).contains(*e)) {
            return Err(Error::SpectralResponse(format!(
                "efficiency {bad} outside [0, 1]"
            )));
        }
        Ok(Self {
            wavelengths,
            efficiencies,
        })
    }

    /// Parses `wavelength efficiency` pairs; `#` starts a comment.
    ///
    /// # Errors
    /// Fails on a line that is not exactly two numbers, or on an invalid table.
    pub fn parse(text: &str) -> Result<Self> {
        let mut wavelengths = Vec::new();
        let mut efficiencies = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [wavelength, efficiency] = fields.as_slice() else {
                return Err(Error::SpectralResponse(format!(
                    "line {}: expected 2 columns, found {}",
                    line_no + 1,
                    fields.len()
                )));
            };
            let parse = |token: &str| {
                token.parse::<f64>().map_err(|_| {
                    Error::SpectralResponse(format!("line {}: invalid number {token:?}", line_no + 1))
                })
            };
            wavelengths.push(parse(*wavelength)?);
            efficiencies.push(parse(*efficiency)?);
        }
        Self::from_table(wavelengths, efficiencies)
    }

    /// Efficiency at `wavelength` (nm).
    #[must_use]
    pub fn at(&self, wavelength: f64) -> f64 {
        let first = self.wavelengths[0];
        let last = self.wavelengths[self.wavelengths.len() - 1];
        if !(first..=last).contains(&wavelength) {
            return 0.0;
        }
        let upper = self
            .wavelengths
            .partition_point(|&w| w < wavelength)
            .max(1);
        let (x0, x1) = (self.wavelengths[upper - 1], self.wavelengths[upper]);
        let (y0, y1) = (self.efficiencies[upper - 1], self.efficiencies[upper]);
        y0 + (y1 - y0) * (wavelength - x0) / (x1 - x0)
    }

    /// Tabulated wavelength range `(min, max)` in nm.
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.wavelengths[0], self.wavelengths[self.wavelengths.len() - 1])
    }
}

/// One photon recorded by [`SpectralTrace`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    /// Arrival time (ns).
    pub time: f64,
    /// Wavelength (nm).
    pub wavelength: f64,
    /// Detection weight: quantum efficiency times gain fraction.
    pub weight: f64,
}

/// Reference response model collecting efficiency-weighted arrivals.
#[derive(Debug, Clone, Default)]
pub struct SpectralTrace {
    table: Option<SpectralTable>,
    arrivals: Vec<Arrival>,
}

impl SpectralTrace {
    /// Creates a trace with unit efficiency at every wavelength.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a trace with a spectral efficiency table.
    #[must_use]
    pub fn with_table(table: SpectralTable) -> Self {
        Self {
            table: Some(table),
            arrivals: Vec::new(),
        }
    }

    /// Loaded spectral table, if any.
    #[must_use]
    pub fn table(&self) -> Option<&SpectralTable> {
        self.table.as_ref()
    }

    /// Efficiency at `wavelength`; 1.0 when no table is loaded.
    #[must_use]
    pub fn efficiency(&self, wavelength: f64) -> f64 {
        self.table.as_ref().map_or(1.0, |table| table.at(wavelength))
    }

    /// Photons of the current event in arrival order of the calls.
    #[must_use]
    pub fn arrivals(&self) -> &[Arrival] {
        &self.arrivals
    }

    /// Sum of all arrival weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.arrivals.iter().map(|a| a.weight).sum()
    }

    /// Digitizes arrival weights into `n_bins` bins of `bin_width` ns starting
    /// at `t_start`. Arrivals outside the window are dropped.
    #[must_use]
    pub fn histogram(&self, t_start: f64, bin_width: f64, n_bins: usize) -> Vec<f64> {
        let mut bins = vec![0.0; n_bins];
        if bin_width <= 0.0 {
            return bins;
        }
        for arrival in &self.arrivals {
            let offset = (arrival.time - t_start) / bin_width;
            if offset >= 0.0 && offset < n_bins as f64 {
                bins[offset as usize] += arrival.weight;
            }
        }
        bins
    }
}

impl ResponseModel for SpectralTrace {
    fn clear(&mut self) {
        self.arrivals.clear();
    }

    fn add_photon_with_gain(&mut self, time: f64, wavelength: f64, gain: f64) {
        let weight = self.efficiency(wavelength) * gain;
        self.arrivals.push(Arrival {
            time,
            wavelength,
            weight,
        });
    }

    fn load_spectral_response(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let table = SpectralTable::parse(&text)?;
        let (min, max) = table.range();
        debug!(path = %path.display(), min, max, "loaded spectral response");
        self.table = Some(table);
        Ok(())
    }
}
