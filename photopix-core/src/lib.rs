//! photopix-core: photon accumulation for simulated photosensors.
//!
//! This crate turns a stream of simulated photon hits into a mass-weighted
//! centroid and time/wavelength statistics, with optional pixelization and
//! per-pixel gain calibration for segmented (multi-anode) sensors.
//!

pub mod accumulator;
pub mod config;
pub mod error;
pub mod gain;
pub mod grid;
pub mod hit;
pub mod readout;
pub mod response;

pub use accumulator::{AccumulatorSummary, PhotonAccumulator, ReadoutMode, SegmentedReadout};
pub use config::{ReadoutConfig, SegmentedConfig, SensorConfig};
pub use error::{Error, Result};
pub use gain::{GainMatrix, DEFAULT_GAIN};
pub use grid::{PixelGrid, PixelIndex, PixelLocation};
pub use hit::{PhotonHit, Position, HC_MEV_NM};
pub use readout::ChargeDivisionReadout;
pub use response::{Arrival, ResponseModel, SpectralTable, SpectralTrace};
