//! Error types for SOM training and inference.

use thiserror::Error;

/// The main error type for somgrid operations.
#[derive(Error, Debug)]
pub enum SomError {
    /// Invalid configuration (unknown metric, unknown init mode, bad knob value).
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Feature dimension of the data disagrees with the prototype matrix.
    #[error("Dimension mismatch: expected {expected} features, found {found}")]
    DimensionMismatch {
        /// Feature dimension of the prototypes.
        expected: usize,
        /// Feature dimension of the offending input.
        found: usize,
    },

    /// Two inputs that must have the same length do not.
    #[error("Length mismatch: expected {expected}, found {found}")]
    LengthMismatch {
        /// The expected length.
        expected: usize,
        /// The length that was provided.
        found: usize,
    },

    /// Empty input.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// The map has no prototypes yet.
    #[error("SOM has not been trained")]
    NotTrained,

    /// Per-cell values were requested before `map` was run.
    #[error("SOM cells have not been mapped; call map() first")]
    NotMapped,

    /// Index out of bounds.
    #[error("Index out of bounds: {index} >= {max}")]
    IndexOutOfBounds {
        /// The index that was out of bounds.
        index: usize,
        /// The maximum allowed index.
        max: usize,
    },

    /// An array could not take the requested shape.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Error reading or writing cached map state.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for somgrid operations.
pub type Result<T> = std::result::Result<T, SomError>;

impl From<bincode::Error> for SomError {
    fn from(err: bincode::Error) -> Self {
        SomError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SomError {
    fn from(err: ndarray::ShapeError) -> Self {
        SomError::Shape(err.to_string())
    }
}
