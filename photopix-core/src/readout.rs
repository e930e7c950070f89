//! Resistive charge-division readout for 8x8 multi-anode sensors.
//!
//! The board routes the charge of every anode onto four corner channels.
//! Channel order is `(-x,-y)`, `(-x,+y)`, `(+x,+y)`, `(+x,-y)`; the position
//! follows from the channel ratios (Anger logic).

use crate::error::{Error, Result};
use crate::gain::GainMatrix;
use ndarray::Array2;

/// Anode columns on the readout board.
pub const READOUT_COLUMNS: usize = 8;
/// Anode rows on the readout board.
pub const READOUT_ROWS: usize = 8;
/// Output channels on the readout board.
pub const READOUT_CHANNELS: usize = 4;

/// Relative channel currents for unit charge on anode `[column][row]`.
#[rustfmt::skip]
pub const ANODE_CURRENTS: [[[f64; READOUT_CHANNELS]; READOUT_ROWS]; READOUT_COLUMNS] = [
    [
        [7.5381e-4, 1.1818e-4, 3.18e-5, 9.62e-5],
        [6.68493e-4, 2.03859e-4, 4.61e-5, 8.15e-5],
        [5.77905e-4, 2.94447e-4, 5.56e-5, 7.21e-5],
        [4.83839e-4, 3.88513e-4, 6.15e-5, 6.62e-5],
        [3.88513e-4, 4.83839e-4, 6.62e-5, 6.15e-5],
        [2.94447e-4, 5.77905e-4, 7.21e-5, 5.56e-5],
        [2.03859e-4, 6.68493e-4, 8.15e-5, 4.61e-5],
        [1.18e-4, 7.54e-4, 9.62e-5, 3.18e-5],
    ],
    [
        [6.59864e-4, 1.05843e-4, 4.42e-5, 1.9e-4],
        [5.84638e-4, 1.81328e-4, 6.87e-5, 1.65e-4],
        [5.05647e-4, 2.60319e-4, 8.97e-5, 1.44e-4],
        [4.24171e-4, 3.41795e-4, 1.08205e-4, 1.26e-4],
        [3.41795e-4, 4.24171e-4, 1.25829e-4, 1.08e-4],
        [2.60319e-4, 5.05647e-4, 1.44353e-4, 8.97e-5],
        [1.81328e-4, 5.84638e-4, 1.65362e-4, 6.87e-5],
        [1.05843e-4, 6.59864e-4, 1.90136e-4, 4.42e-5],
    ],
    [
        [5.65918e-4, 9.35e-5, 5.65e-5, 2.84e-4],
        [5.00783e-4, 1.58797e-4, 9.12e-5, 2.49e-4],
        [4.33388e-4, 2.26192e-4, 1.23808e-4, 2.17e-4],
        [3.64502e-4, 2.95077e-4, 1.54923e-4, 1.85e-4],
        [2.95077e-4, 3.64502e-4, 1.85498e-4, 1.55e-4],
        [2.26192e-4, 4.33388e-4, 2.16612e-4, 1.24e-4],
        [1.58797e-4, 5.00783e-4, 2.49217e-4, 9.12e-5],
        [9.35e-5, 5.65918e-4, 2.84082e-4, 5.65e-5],
    ],
    [
        [4.71973e-4, 8.12e-5, 6.88e-5, 3.78027e-4],
        [4.16928e-4, 1.36266e-4, 1.13734e-4, 3.33072e-4],
        [3.61129e-4, 1.92064e-4, 1.57936e-4, 2.88871e-4],
        [3.04834e-4, 2.48359e-4, 2.01641e-4, 2.45166e-4],
        [2.48359e-4, 3.04834e-4, 2.45166e-4, 2.01641e-4],
        [1.92064e-4, 3.61129e-4, 2.88871e-4, 1.57936e-4],
        [1.36266e-4, 4.16928e-4, 3.33072e-4, 1.13734e-4],
        [8.12e-5, 4.71973e-4, 3.78027e-4, 6.88e-5],
    ],
    [
        [3.78027e-4, 6.88e-5, 8.12e-5, 4.71973e-4],
        [3.33072e-4, 1.13734e-4, 1.36266e-4, 4.16928e-4],
        [2.88871e-4, 1.57936e-4, 1.92064e-4, 3.61129e-4],
        [2.45166e-4, 2.01641e-4, 2.48359e-4, 3.04834e-4],
        [2.01641e-4, 2.45166e-4, 3.04834e-4, 2.48359e-4],
        [1.57936e-4, 2.88871e-4, 3.61129e-4, 1.92064e-4],
        [1.13734e-4, 3.33072e-4, 4.16928e-4, 1.36266e-4],
        [6.88e-5, 3.78027e-4, 4.71973e-4, 8.12e-5],
    ],
    [
        [2.84082e-4, 5.65e-5, 9.35e-5, 5.65918e-4],
        [2.49217e-4, 9.12e-5, 1.58797e-4, 5.00783e-4],
        [2.16612e-4, 1.23808e-4, 2.26192e-4, 4.33388e-4],
        [1.85498e-4, 1.54923e-4, 2.95077e-4, 3.64502e-4],
        [1.54923e-4, 1.85498e-4, 3.64502e-4, 2.95077e-4],
        [1.23808e-4, 2.16612e-4, 4.33388e-4, 2.26192e-4],
        [9.12e-5, 2.49217e-4, 5.00783e-4, 1.58797e-4],
        [5.65e-5, 2.84082e-4, 5.65918e-4, 9.35e-5],
    ],
    [
        [1.90136e-4, 4.42e-5, 1.05843e-4, 6.59864e-4],
        [1.65362e-4, 6.87e-5, 1.81328e-4, 5.84638e-4],
        [1.44353e-4, 8.97e-5, 2.60319e-4, 5.05647e-4],
        [1.25829e-4, 1.08205e-4, 3.41795e-4, 4.24171e-4],
        [1.08205e-4, 1.25829e-4, 4.24171e-4, 3.41795e-4],
        [8.97e-5, 1.44353e-4, 5.05647e-4, 2.60319e-4],
        [6.87e-5, 1.65362e-4, 5.84638e-4, 1.81328e-4],
        [4.42e-5, 1.90136e-4, 6.59864e-4, 1.05843e-4],
    ],
    [
        [9.62e-5, 3.18e-5, 1.1818e-4, 7.5381e-4],
        [8.15e-5, 4.61e-5, 2.03859e-4, 6.68493e-4],
        [7.21e-5, 5.56e-5, 2.94447e-4, 5.77905e-4],
        [6.62e-5, 6.15e-5, 3.88513e-4, 4.83839e-4],
        [6.15e-5, 6.62e-5, 4.83839e-4, 3.88513e-4],
        [5.56e-5, 7.21e-5, 5.77905e-4, 2.94447e-4],
        [4.61e-5, 8.15e-5, 6.68493e-4, 2.03859e-4],
        [3.18e-5, 9.62e-5, 7.54e-4, 1.18e-4],
    ],
];

/// Charge-division board with a fixed anode-to-channel current table.
#[derive(Debug, Clone, Copy)]
pub struct ChargeDivisionReadout {
    currents: &'static [[[f64; READOUT_CHANNELS]; READOUT_ROWS]; READOUT_COLUMNS],
}

impl Default for ChargeDivisionReadout {
    fn default() -> Self {
        Self {
            currents: &ANODE_CURRENTS,
        }
    }
}

impl ChargeDivisionReadout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Board with a custom current table.
    #[must_use]
    pub fn with_table(
        currents: &'static [[[f64; READOUT_CHANNELS]; READOUT_ROWS]; READOUT_COLUMNS],
    ) -> Self {
        Self { currents }
    }

    /// Channel currents for a per-anode hit map.
    ///
    /// Each anode contributes `mass * gain / 100` times its table entry,
    /// matching the gain fraction handed to the response model.
    ///
    /// # Errors
    /// Returns [`Error::ReadoutShape`] unless both the hit map and the gain
    /// matrix are 8x8.
    pub fn currents(&self, hit_map: &Array2<f64>, gains: &GainMatrix) -> Result<[f64; 4]> {
        let (columns, rows) = hit_map.dim();
        if (columns, rows) != (READOUT_COLUMNS, READOUT_ROWS)
            || gains.as_array().dim() != (READOUT_COLUMNS, READOUT_ROWS)
        {
            return Err(Error::ReadoutShape {
                expected_columns: READOUT_COLUMNS,
                expected_rows: READOUT_ROWS,
                columns,
                rows,
            });
        }

        let mut channels = [0.0; READOUT_CHANNELS];
        for ((column, row), &mass) in hit_map.indexed_iter() {
            let charge = mass * gains.as_array()[[column, row]] / 100.0;
            for (channel, current) in channels.iter_mut().zip(self.currents[column][row]) {
                *channel += charge * current;
            }
        }
        Ok(channels)
    }

    /// Anger-logic position in `[-1, 1]` from the four channel currents.
    ///
    /// Returns `None` when no current was collected.
    #[must_use]
    pub fn anger_position(channels: &[f64; 4]) -> Option<(f64, f64)> {
        let [a, b, c, d] = *channels;
        let sum = a + b + c + d;
        if !(sum.is_finite() && sum > 0.0) {
            return None;
        }
        Some(((c + d - a - b) / sum, (b + c - a - d) / sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single_anode(column: usize, row: usize) -> Array2<f64> {
        let mut map = Array2::zeros((8, 8));
        map[[column, row]] = 1.0;
        map
    }

    #[test]
    fn test_corner_anodes_land_in_their_quadrant() {
        let readout = ChargeDivisionReadout::new();
        let gains = GainMatrix::new(8, 8);

        let low = readout.currents(&single_anode(0, 0), &gains).unwrap();
        let (x, y) = ChargeDivisionReadout::anger_position(&low).unwrap();
        assert!(x < -0.7 && y < -0.7);

        let high = readout.currents(&single_anode(7, 7), &gains).unwrap();
        let (hx, hy) = ChargeDivisionReadout::anger_position(&high).unwrap();
        assert_relative_eq!(hx, -x, epsilon = 1e-3);
        assert_relative_eq!(hy, -y, epsilon = 1e-3);

        let mixed = readout.currents(&single_anode(0, 7), &gains).unwrap();
        let (mx, my) = ChargeDivisionReadout::anger_position(&mixed).unwrap();
        assert!(mx < 0.0 && my > 0.0);
    }

    #[test]
    fn test_uniform_illumination_is_centered() {
        let readout = ChargeDivisionReadout::new();
        let gains = GainMatrix::new(8, 8);
        let map = Array2::from_elem((8, 8), 3.0);
        let channels = readout.currents(&map, &gains).unwrap();
        let (x, y) = ChargeDivisionReadout::anger_position(&channels).unwrap();
        assert!(x.abs() < 1e-3);
        assert!(y.abs() < 1e-3);
    }

    #[test]
    fn test_currents_scale_with_gain_percentage() {
        let readout = ChargeDivisionReadout::new();
        let mut gains = GainMatrix::new(8, 8);
        gains.set_gain(0, 0, 50.0).unwrap();
        let channels = readout.currents(&single_anode(0, 0), &gains).unwrap();
        assert_relative_eq!(channels[0], 0.5 * 7.5381e-4, epsilon = 1e-15);
    }

    #[test]
    fn test_empty_map_and_wrong_shape() {
        let readout = ChargeDivisionReadout::new();
        let gains = GainMatrix::new(8, 8);
        let channels = readout.currents(&Array2::zeros((8, 8)), &gains).unwrap();
        assert_eq!(ChargeDivisionReadout::anger_position(&channels), None);

        let err = readout
            .currents(&Array2::zeros((4, 4)), &GainMatrix::new(4, 4))
            .unwrap_err();
        assert!(matches!(err, Error::ReadoutShape { columns: 4, .. }));
    }
}
