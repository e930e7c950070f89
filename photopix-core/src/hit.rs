//! Photon hit types delivered by the transport engine.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul};

/// Planck constant times the speed of light, in MeV·nm.
pub const HC_MEV_NM: f64 = 1.239_841_93e-3;

/// Position on (or near) the sensor face, in sensor-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// The origin.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Creates a new position.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Add for Position {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Position {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Mul<f64> for Position {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Position {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// A single simulated photon reaching the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotonHit {
    /// Arrival position.
    pub position: Position,
    /// Global arrival time (ns).
    pub time: f64,
    /// Total photon energy (MeV).
    pub energy: f64,
}

impl PhotonHit {
    /// Creates a new photon hit.
    #[inline]
    #[must_use]
    pub fn new(position: Position, time: f64, energy: f64) -> Self {
        Self {
            position,
            time,
            energy,
        }
    }

    /// Creates a hit from a photon wavelength (nm) instead of its energy.
    #[inline]
    #[must_use]
    pub fn from_wavelength(position: Position, time: f64, wavelength_nm: f64) -> Self {
        Self::new(position, time, HC_MEV_NM / wavelength_nm)
    }

    /// Photon wavelength in nm.
    ///
    /// Energy is not validated: zero gives an infinite wavelength and a
    /// negative energy a negative one.
    #[inline]
    #[must_use]
    pub fn wavelength(&self) -> f64 {
        HC_MEV_NM / self.energy
    }
}
