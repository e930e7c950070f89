//! Per-pixel gain calibration.
//!
//! Gains are stored on a 0-100 percentage scale; the accumulator forwards
//! `gain / 100` to the response model. A freshly sized matrix holds 1.0
//! everywhere.
//!
//! # File format
//! Whitespace-separated reals, `columns * rows` of them, with the column as
//! the outer loop and the row as the inner loop. No header. Values past the
//! expected count are ignored.

use crate::error::{Error, Result};
use ndarray::Array2;
use std::path::Path;
use tracing::{debug, warn};

/// Default gain of an uncalibrated pixel.
pub const DEFAULT_GAIN: f64 = 1.0;

/// Gain multipliers indexed by `[column, row]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GainMatrix {
    gains: Array2<f64>,
}

impl Default for GainMatrix {
    /// An unsized matrix; loading into it always fails.
    fn default() -> Self {
        Self {
            gains: Array2::zeros((0, 0)),
        }
    }
}

impl GainMatrix {
    /// Creates a `columns x rows` matrix filled with [`DEFAULT_GAIN`].
    #[must_use]
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            gains: Array2::from_elem((columns, rows), DEFAULT_GAIN),
        }
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.gains.nrows()
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.gains.ncols()
    }

    /// True if the matrix has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    /// Gain of one pixel, or `None` outside the matrix.
    #[inline]
    #[must_use]
    pub fn gain(&self, column: usize, row: usize) -> Option<f64> {
        self.gains.get((column, row)).copied()
    }

    /// Overwrites the gain of one pixel.
    ///
    /// # Errors
    /// Returns [`Error::PixelOutOfRange`] outside the matrix.
    pub fn set_gain(&mut self, column: usize, row: usize, gain: f64) -> Result<()> {
        let (columns, rows) = self.gains.dim();
        match self.gains.get_mut((column, row)) {
            Some(slot) => {
                *slot = gain;
                Ok(())
            }
            None => Err(Error::PixelOutOfRange {
                column,
                row,
                columns,
                rows,
            }),
        }
    }

    /// Resets every pixel to [`DEFAULT_GAIN`].
    pub fn reset(&mut self) {
        self.gains.fill(DEFAULT_GAIN);
    }

    /// Underlying array.
    #[must_use]
    pub fn as_array(&self) -> &Array2<f64> {
        &self.gains
    }

    /// Loads gains from a text file.
    ///
    /// The matrix is only modified if the whole file parses; on any error the
    /// previous gains are kept.
    ///
    /// # Errors
    /// Fails if the matrix is unsized, the file cannot be read, a value is
    /// not a number, or fewer than `columns * rows` values are present.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if self.is_empty() {
            warn!(path = %path.display(), "gain matrix load requested before sizing");
            return Err(Error::GainMatrixUnsized);
        }
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text).inspect_err(|err| {
            warn!(path = %path.display(), %err, "gain matrix load rejected");
        })?;
        debug!(
            path = %path.display(),
            columns = self.columns(),
            rows = self.rows(),
            "loaded gain matrix"
        );
        Ok(())
    }

    /// Loads gains from already-read file contents.
    ///
    /// # Errors
    /// Same conditions as [`GainMatrix::load`], minus the I/O ones.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        if self.is_empty() {
            return Err(Error::GainMatrixUnsized);
        }
        let expected = self.gains.len();
        let mut staged = Vec::with_capacity(expected);
        for (index, token) in text.split_whitespace().take(expected).enumerate() {
            let value = token.parse::<f64>().map_err(|_| Error::InvalidValue {
                index,
                token: token.to_string(),
            })?;
            staged.push(value);
        }
        if staged.len() < expected {
            return Err(Error::TruncatedGainFile {
                expected,
                read: staged.len(),
            });
        }

        // Column-outer / row-inner is the standard (row-major) layout of a
        // (columns, rows) array.
        let staged = Array2::from_shape_vec(self.gains.raw_dim(), staged)
            .map_err(|err| Error::InvalidConfig(err.to_string()))?;
        self.gains = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_values(values: &[f64]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for chunk in values.chunks(8) {
            let line: Vec<String> = chunk.iter().map(ToString::to_string).collect();
            writeln!(file, "{}", line.join(" ")).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_new_matrix_defaults_to_one() {
        let gains = GainMatrix::new(8, 4);
        assert_eq!(gains.columns(), 8);
        assert_eq!(gains.rows(), 4);
        assert!(gains.as_array().iter().all(|&g| g == 1.0));
        assert_eq!(gains.gain(8, 0), None);
    }

    #[test]
    fn test_load_column_outer_order() {
        // All rows of column 0 first, then column 1 and so on
        let mut values = vec![1.0; 64];
        values[3 * 8 + 2] = 0.5;
        let file = write_values(&values);

        let mut gains = GainMatrix::new(8, 8);
        gains.load(file.path()).unwrap();

        for column in 0..8 {
            for row in 0..8 {
                let expected = if (column, row) == (3, 2) { 0.5 } else { 1.0 };
                assert_eq!(gains.gain(column, row), Some(expected));
            }
        }
    }

    #[test]
    fn test_load_non_square_order() {
        let mut gains = GainMatrix::new(2, 3);
        gains.load_str("10 11 12\n20 21 22").unwrap();
        assert_eq!(gains.gain(0, 2), Some(12.0));
        assert_eq!(gains.gain(1, 0), Some(20.0));
    }

    #[test]
    fn test_truncated_file_is_rejected_atomically() {
        let mut gains = GainMatrix::new(8, 8);
        gains.set_gain(0, 0, 42.0).unwrap();

        let file = write_values(&[0.25; 63]);
        let err = gains.load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedGainFile {
                expected: 64,
                read: 63
            }
        ));

        // Nothing from the partial file leaked in
        assert_eq!(gains.gain(0, 0), Some(42.0));
        assert_eq!(gains.gain(0, 1), Some(1.0));
        assert_eq!(gains.gain(7, 6), Some(1.0));
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let mut gains = GainMatrix::new(1, 3);
        let err = gains.load_str("1.0 abc 2.0").unwrap_err();
        assert!(matches!(err, Error::InvalidValue { index: 1, .. }));
        assert_eq!(gains.gain(0, 0), Some(1.0));
    }

    #[test]
    fn test_extra_values_are_ignored() {
        let mut gains = GainMatrix::new(1, 2);
        gains.load_str("3 4 5 6").unwrap();
        assert_eq!(gains.gain(0, 1), Some(4.0));
    }

    #[test]
    fn test_unsized_and_missing_file() {
        let mut unsized_gains = GainMatrix::default();
        assert!(matches!(
            unsized_gains.load_str("1 2 3"),
            Err(Error::GainMatrixUnsized)
        ));

        let mut gains = GainMatrix::new(2, 2);
        assert!(matches!(
            gains.load("/nonexistent/photopix/gains.txt"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_set_gain_out_of_range() {
        let mut gains = GainMatrix::new(2, 2);
        assert!(matches!(
            gains.set_gain(2, 0, 5.0),
            Err(Error::PixelOutOfRange { column: 2, .. })
        ));
        gains.set_gain(1, 1, 5.0).unwrap();
        gains.reset();
        assert_eq!(gains.gain(1, 1), Some(1.0));
    }
}
