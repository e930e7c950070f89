//! Pixel grid for segmented (multi-anode) sensors.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
//!
//! The grid covers an active area centred on the sensor origin. A continuous
//! position is mapped to grid-fraction coordinates, then to integer pixel
//! indices and back to the centre of that pixel.

use crate::error::{Error, Result};
use crate::hit::Position;

/// Column/row index of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelIndex {
    pub column: usize,
    pub row: usize,
}

impl PixelIndex {
    /// Creates a new pixel index.
    #[inline]
    #[must_use]
    pub fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }
}

/// Result of mapping a position onto the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelLocation {
    /// Pixel the position falls in (clamped to the grid).
    pub index: PixelIndex,
    /// Centre of that pixel in sensor coordinates; z is carried through.
    pub center: Position,
}

/// Regular grid of `columns x rows` pixels over a `width x height` active area.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    columns: u16,
    rows: u16,
    width: f64,
    height: f64,
    pixel_width: f64,
    pixel_height: f64,
}

impl PixelGrid {
    /// Builds a grid.
    ///
    /// # Errors
    /// Fails on zero columns or rows, or on a non-positive or non-finite
    /// active-area dimension.
    pub fn new(columns: u16, rows: u16, width: f64, height: f64) -> Result<Self> {
        validate_counts(columns, rows)?;
        validate_area(width, height)?;
        Ok(Self {
            columns,
            rows,
            width,
            height,
            pixel_width: width / f64::from(columns),
            pixel_height: height / f64::from(rows),
        })
    }

    #[must_use]
    pub fn columns(&self) -> u16 {
        self.columns
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[must_use]
    pub fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    #[must_use]
    pub fn pixel_height(&self) -> f64 {
        self.pixel_height
    }

    /// Number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.columns) * usize::from(self.rows)
    }

    /// Always false; a grid has at least one pixel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the column count and recomputes the pixel width.
    ///
    /// # Errors
    /// Fails on zero columns; the grid is left unchanged.
    pub fn set_columns(&mut self, columns: u16) -> Result<()> {
        validate_counts(columns, self.rows)?;
        self.columns = columns;
        self.pixel_width = self.width / f64::from(columns);
        Ok(())
    }

    /// Sets the row count and recomputes the pixel height.
    ///
    /// # Errors
    /// Fails on zero rows; the grid is left unchanged.
    pub fn set_rows(&mut self, rows: u16) -> Result<()> {
        validate_counts(self.columns, rows)?;
        self.rows = rows;
        self.pixel_height = self.height / f64::from(rows);
        Ok(())
    }

    /// Sets the active-area width and recomputes the pixel width.
    ///
    /// # Errors
    /// Fails on a non-positive or non-finite width.
    pub fn set_width(&mut self, width: f64) -> Result<()> {
        validate_area(width, self.height)?;
        self.width = width;
        self.pixel_width = width / f64::from(self.columns);
        Ok(())
    }

    /// Sets the active-area height and recomputes the pixel height.
    ///
    /// # Errors
    /// Fails on a non-positive or non-finite height.
    pub fn set_height(&mut self, height: f64) -> Result<()> {
        validate_area(self.width, height)?;
        self.height = height;
        self.pixel_height = height / f64::from(self.rows);
        Ok(())
    }

    /// Grid-fraction coordinates of `(x, y)`.
    ///
    /// The lower-left corner of the active area maps to `(0, 0)` and the
    /// upper-right corner to `(columns, rows)`.
    #[inline]
    #[must_use]
    pub fn fraction(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x + self.width / 2.0) / self.pixel_width,
            (y + self.height / 2.0) / self.pixel_height,
        )
    }

    /// True if `position` lies inside the active area (upper edges excluded).
    #[must_use]
    pub fn contains(&self, position: &Position) -> bool {
        let (u, v) = self.fraction(position.x, position.y);
        (0.0..f64::from(self.columns)).contains(&u) && (0.0..f64::from(self.rows)).contains(&v)
    }

    /// Centre of a pixel in sensor coordinates, with `z = 0`.
    #[must_use]
    pub fn pixel_center(&self, index: PixelIndex) -> Position {
        Position::new(
            (index.column as f64 + 0.5) * self.pixel_width - self.width / 2.0,
            (index.row as f64 + 0.5) * self.pixel_height - self.height / 2.0,
            0.0,
        )
    }

    /// Maps a position to its pixel and that pixel's centre.
    ///
    /// Positions on or beyond the active-area boundary are clamped to the
    /// nearest edge pixel.
    #[must_use]
    pub fn locate(&self, position: &Position) -> PixelLocation {
        let (u, v) = self.fraction(position.x, position.y);
        let index = PixelIndex::new(
            clamp_index(u, self.columns),
            clamp_index(v, self.rows),
        );
        let mut center = self.pixel_center(index);
        center.z = position.z;
        PixelLocation { index, center }
    }
}

fn clamp_index(fraction: f64, count: u16) -> usize {
    // NaN falls through clamp and casts to 0.
    fraction.floor().clamp(0.0, f64::from(count - 1)) as usize
}

fn validate_counts(columns: u16, rows: u16) -> Result<()> {
    if columns == 0 || rows == 0 {
        return Err(Error::EmptyGrid { columns, rows });
    }
    Ok(())
}

fn validate_area(width: f64, height: f64) -> Result<()> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(width) || !valid(height) {
        return Err(Error::InvalidActiveArea { width, height });
    }
    Ok(())
}
