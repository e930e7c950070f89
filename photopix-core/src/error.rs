//! Error types for photopix-core.

use thiserror::Error;

/// Result type alias for photopix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for photopix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Pixel grid built with zero columns or rows.
    #[error("pixel grid needs at least one column and one row (got {columns}x{rows})")]
    EmptyGrid { columns: u16, rows: u16 },

    /// Active area with a non-positive or non-finite dimension.
    #[error("invalid active area: {width} x {height}")]
    InvalidActiveArea { width: f64, height: f64 },

    /// Gain matrix requested before the readout was segmented.
    #[error("gain matrix has not been sized; configure a segmented readout first")]
    GainMatrixUnsized,

    /// Grid setter called while the readout is continuous.
    #[error("readout is not segmented")]
    NotSegmented,

    /// Pixel index outside the grid.
    #[error("pixel ({column}, {row}) is outside the {columns}x{rows} grid")]
    PixelOutOfRange {
        column: usize,
        row: usize,
        columns: usize,
        rows: usize,
    },

    /// Gain file ended before every pixel was read.
    #[error("truncated gain file: expected {expected} values, read {read}")]
    TruncatedGainFile { expected: usize, read: usize },

    /// Token that does not parse as a real number.
    #[error("invalid value {token:?} at position {index}")]
    InvalidValue { index: usize, token: String },

    /// Malformed spectral response table.
    #[error("spectral response error: {0}")]
    SpectralResponse(String),

    /// Readout board does not match the grid shape.
    #[error("readout expects a {expected_columns}x{expected_rows} grid, got {columns}x{rows}")]
    ReadoutShape {
        expected_columns: usize,
        expected_rows: usize,
        columns: usize,
        rows: usize,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// JSON configuration could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
