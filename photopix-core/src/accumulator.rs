//! Photon accumulation for one detector element.
#![allow(clippy::cast_precision_loss)]
//!
//! The host transport engine calls [`PhotonAccumulator::add_point`] once per
//! photon reaching the sensor. The accumulator keeps running sums for the
//! centroid and the time/wavelength statistics and forwards each photon to its
//! [`ResponseModel`]. State is read back at the end of the event and reset with
//! [`PhotonAccumulator::clear`].
//!
//! # Readout modes
//! - [`ReadoutMode::Continuous`]: positions are summed as given and photons are
//!   forwarded at full gain.
//! - [`ReadoutMode::Segmented`]: positions are snapped to the centre of the
//!   pixel they fall in, and photons are forwarded with that pixel's gain
//!   divided by 100. Sub-pixel information is discarded by construction.

use crate::config::{ReadoutConfig, SensorConfig};
use crate::error::{Error, Result};
use crate::gain::{GainMatrix, DEFAULT_GAIN};
use crate::grid::PixelGrid;
use crate::hit::{PhotonHit, Position};
use crate::readout::ChargeDivisionReadout;
use crate::response::{ResponseModel, SpectralTrace};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Pixel grid with its calibration and per-pixel hit map.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedReadout {
    grid: PixelGrid,
    gains: GainMatrix,
    hit_map: Array2<f64>,
}

impl SegmentedReadout {
    /// Wraps a grid with a unit gain matrix and an empty hit map.
    #[must_use]
    pub fn new(grid: PixelGrid) -> Self {
        let shape = (usize::from(grid.columns()), usize::from(grid.rows()));
        Self {
            grid,
            gains: GainMatrix::new(shape.0, shape.1),
            hit_map: Array2::zeros(shape),
        }
    }

    #[must_use]
    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    #[must_use]
    pub fn gains(&self) -> &GainMatrix {
        &self.gains
    }

    /// Accumulated mass per pixel, indexed `[column, row]`.
    #[must_use]
    pub fn hit_map(&self) -> &Array2<f64> {
        &self.hit_map
    }

    // Keeps gains and hit map shaped like the grid after a count change.
    fn reshape(&mut self) {
        let shape = (usize::from(self.grid.columns()), usize::from(self.grid.rows()));
        if self.hit_map.dim() != shape {
            self.gains = GainMatrix::new(shape.0, shape.1);
            self.hit_map = Array2::zeros(shape);
        }
    }
}

/// How hit positions are reconstructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReadoutMode {
    #[default]
    Continuous,
    Segmented(SegmentedReadout),
}

impl ReadoutMode {
    #[must_use]
    pub fn is_segmented(&self) -> bool {
        matches!(self, Self::Segmented(_))
    }

    /// Pixel grid of a segmented readout.
    #[must_use]
    pub fn grid(&self) -> Option<&PixelGrid> {
        match self {
            Self::Continuous => None,
            Self::Segmented(readout) => Some(&readout.grid),
        }
    }
}

/// End-of-event snapshot of an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorSummary {
    pub n_points: usize,
    pub n_not_detected: usize,
    pub total_mass: f64,
    /// Mass-weighted centroid (zero when empty).
    pub center: Position,
    /// Earliest arrival time, `None` when empty.
    pub t0: Option<f64>,
    pub mean_time: Option<f64>,
    pub mean_wavelength: Option<f64>,
}

/// Running photon sums for one detector element.
#[derive(Debug, Clone)]
pub struct PhotonAccumulator<R: ResponseModel = SpectralTrace> {
    mode: ReadoutMode,
    response: R,
    total_mass: f64,
    center: Position,
    num_points: usize,
    num_not_detected: usize,
    time_sum: f64,
    wavelength_sum: f64,
    t0: f64,
}

impl Default for PhotonAccumulator<SpectralTrace> {
    fn default() -> Self {
        Self::new(SpectralTrace::default())
    }
}

impl<R: ResponseModel> PhotonAccumulator<R> {
    /// Creates an empty accumulator with a continuous readout.
    pub fn new(response: R) -> Self {
        let mut accumulator = Self {
            mode: ReadoutMode::Continuous,
            response,
            total_mass: 0.0,
            center: Position::ZERO,
            num_points: 0,
            num_not_detected: 0,
            time_sum: 0.0,
            wavelength_sum: 0.0,
            t0: f64::INFINITY,
        };
        accumulator.clear();
        accumulator
    }

    /// Builds an accumulator from a sensor configuration, loading its
    /// calibration files.
    ///
    /// # Errors
    /// Fails on an invalid grid or if a calibration file cannot be loaded.
    pub fn from_config(config: &SensorConfig, response: R) -> Result<Self> {
        let mut accumulator = Self::new(response);
        if let ReadoutConfig::Segmented(segmented) = &config.readout {
            accumulator.set_segmented_pmt(
                segmented.columns,
                segmented.rows,
                segmented.width,
                segmented.height,
            )?;
        }
        if let Some(path) = &config.gain_file {
            accumulator.load_gain_matrix(path)?;
        }
        if let Some(path) = &config.spectral_response {
            accumulator.load_spectral_response(path)?;
        }
        Ok(accumulator)
    }

    /// Resets all sums and the response model.
    pub fn clear(&mut self) {
        self.num_points = 0;
        self.num_not_detected = 0;
        self.time_sum = 0.0;
        self.wavelength_sum = 0.0;
        self.total_mass = 0.0;
        self.center = Position::ZERO;
        self.t0 = f64::INFINITY;
        if let ReadoutMode::Segmented(readout) = &mut self.mode {
            readout.hit_map.fill(0.0);
        }
        self.response.clear();
    }

    /// Adds a photon with unit mass.
    pub fn add_point(&mut self, hit: &PhotonHit) -> bool {
        self.add_point_weighted(hit, 1.0)
    }

    /// Adds a photon with the given mass and forwards it to the response
    /// model.
    ///
    /// Always returns `true`.
    pub fn add_point_weighted(&mut self, hit: &PhotonHit, mass: f64) -> bool {
        let wavelength = hit.wavelength();
        let time = hit.time;

        self.total_mass += mass;
        self.num_points += 1;

        match &mut self.mode {
            ReadoutMode::Continuous => {
                self.center += hit.position * mass;
                self.response.add_photon(time, wavelength);
            }
            ReadoutMode::Segmented(readout) => {
                let location = readout.grid.locate(&hit.position);
                let (column, row) = (location.index.column, location.index.row);
                self.center += location.center * mass;
                readout.hit_map[[column, row]] += mass;

                let gain = readout.gains.gain(column, row).unwrap_or(DEFAULT_GAIN);
                self.response
                    .add_photon_with_gain(time, wavelength, gain / 100.0);
            }
        }

        self.time_sum += time;
        self.wavelength_sum += wavelength;
        self.t0 = self.t0.min(time);

        true
    }

    /// Mass-weighted centroid; the zero vector when nothing was added.
    #[must_use]
    pub fn center(&self) -> Position {
        if self.total_mass > 0.0 {
            self.center / self.total_mass
        } else {
            self.center
        }
    }

    #[must_use]
    pub fn center_x(&self) -> f64 {
        if self.total_mass > 0.0 {
            self.center.x / self.total_mass
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn center_y(&self) -> f64 {
        if self.total_mass > 0.0 {
            self.center.y / self.total_mass
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn center_z(&self) -> f64 {
        if self.total_mass > 0.0 {
            self.center.z / self.total_mass
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// True if no photon was added since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Earliest arrival time; `f64::INFINITY` when empty.
    #[must_use]
    pub fn t0(&self) -> f64 {
        self.t0
    }

    #[must_use]
    pub fn time_sum(&self) -> f64 {
        self.time_sum
    }

    #[must_use]
    pub fn wavelength_sum(&self) -> f64 {
        self.wavelength_sum
    }

    #[must_use]
    pub fn mean_time(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.time_sum / self.num_points as f64)
    }

    #[must_use]
    pub fn mean_wavelength(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.wavelength_sum / self.num_points as f64)
    }

    /// Photons rejected upstream, as counted by the caller.
    #[must_use]
    pub fn num_not_detected(&self) -> usize {
        self.num_not_detected
    }

    pub fn add_not_detected(&mut self, count: usize) {
        self.num_not_detected += count;
    }

    /// Snapshot of the current statistics.
    #[must_use]
    pub fn summary(&self) -> AccumulatorSummary {
        AccumulatorSummary {
            n_points: self.num_points,
            n_not_detected: self.num_not_detected,
            total_mass: self.total_mass,
            center: self.center(),
            t0: (!self.is_empty()).then_some(self.t0),
            mean_time: self.mean_time(),
            mean_wavelength: self.mean_wavelength(),
        }
    }

    /// Prints mass, centroid, `t0` and mean time to stdout; silent when empty.
    pub fn print(&self) {
        if !self.is_empty() {
            println!("{self}");
        }
    }

    #[must_use]
    pub fn mode(&self) -> &ReadoutMode {
        &self.mode
    }

    /// Gain matrix of a segmented readout.
    #[must_use]
    pub fn gain_matrix(&self) -> Option<&GainMatrix> {
        match &self.mode {
            ReadoutMode::Continuous => None,
            ReadoutMode::Segmented(readout) => Some(&readout.gains),
        }
    }

    /// Per-pixel mass of a segmented readout.
    #[must_use]
    pub fn hit_map(&self) -> Option<&Array2<f64>> {
        match &self.mode {
            ReadoutMode::Continuous => None,
            ReadoutMode::Segmented(readout) => Some(&readout.hit_map),
        }
    }

    #[must_use]
    pub fn response(&self) -> &R {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut R {
        &mut self.response
    }

    #[must_use]
    pub fn into_response(self) -> R {
        self.response
    }

    /// Charge-division channel currents of the current event.
    ///
    /// # Errors
    /// Fails in continuous mode or if the grid is not 8x8.
    pub fn readout_currents(&self) -> Result<[f64; 4]> {
        match &self.mode {
            ReadoutMode::Continuous => Err(Error::NotSegmented),
            ReadoutMode::Segmented(readout) => {
                ChargeDivisionReadout::new().currents(&readout.hit_map, &readout.gains)
            }
        }
    }

    /// Switches to a segmented readout with a fresh unit gain matrix.
    ///
    /// # Errors
    /// Fails on zero columns or rows, or on an invalid active area; the
    /// current mode is kept.
    pub fn set_segmented_pmt(
        &mut self,
        columns: u16,
        rows: u16,
        width: f64,
        height: f64,
    ) -> Result<()> {
        let grid = PixelGrid::new(columns, rows, width, height)?;
        debug!(columns, rows, width, height, "segmented readout configured");
        self.mode = ReadoutMode::Segmented(SegmentedReadout::new(grid));
        Ok(())
    }

    /// Switches back to continuous reconstruction, dropping the grid and gains.
    pub fn set_continuous(&mut self) {
        debug!("continuous readout configured");
        self.mode = ReadoutMode::Continuous;
    }

    /// Changes the column count. The gain matrix and hit map are reset when
    /// the count changes.
    ///
    /// # Errors
    /// [`Error::NotSegmented`] in continuous mode, [`Error::EmptyGrid`] for 0.
    pub fn set_num_columns(&mut self, columns: u16) -> Result<()> {
        let readout = self.segmented_mut()?;
        readout.grid.set_columns(columns)?;
        readout.reshape();
        Ok(())
    }

    /// Changes the row count. The gain matrix and hit map are reset when the
    /// count changes.
    ///
    /// # Errors
    /// [`Error::NotSegmented`] in continuous mode, [`Error::EmptyGrid`] for 0.
    pub fn set_num_rows(&mut self, rows: u16) -> Result<()> {
        let readout = self.segmented_mut()?;
        readout.grid.set_rows(rows)?;
        readout.reshape();
        Ok(())
    }

    /// # Errors
    /// [`Error::NotSegmented`] in continuous mode,
    /// [`Error::InvalidActiveArea`] for a non-positive width.
    pub fn set_active_area_width(&mut self, width: f64) -> Result<()> {
        self.segmented_mut()?.grid.set_width(width)
    }

    /// # Errors
    /// [`Error::NotSegmented`] in continuous mode,
    /// [`Error::InvalidActiveArea`] for a non-positive height.
    pub fn set_active_area_height(&mut self, height: f64) -> Result<()> {
        self.segmented_mut()?.grid.set_height(height)
    }

    /// Loads per-pixel gains; the previous gains survive any failure.
    ///
    /// # Errors
    /// [`Error::GainMatrixUnsized`] in continuous mode, otherwise the errors of
    /// [`GainMatrix::load`].
    pub fn load_gain_matrix<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        match &mut self.mode {
            ReadoutMode::Continuous => Err(Error::GainMatrixUnsized),
            ReadoutMode::Segmented(readout) => readout.gains.load(path),
        }
    }

    /// Loads the spectral response of the response model.
    ///
    /// # Errors
    /// Whatever the response model reports.
    pub fn load_spectral_response<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.response.load_spectral_response(path.as_ref())
    }

    fn segmented_mut(&mut self) -> Result<&mut SegmentedReadout> {
        match &mut self.mode {
            ReadoutMode::Continuous => Err(Error::NotSegmented),
            ReadoutMode::Segmented(readout) => Ok(readout),
        }
    }
}

impl<R: ResponseModel> fmt::Display for PhotonAccumulator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        writeln!(
            f,
            "M={}, c=({}, {}, {})",
            self.total_mass,
            self.center_x(),
            self.center_y(),
            self.center_z()
        )?;
        write!(
            f,
            " t0={}, tAvg={}",
            self.t0,
            self.time_sum / self.num_points as f64
        )
    }
}
