//! Crate-level error type.
//!
//! Every fallible public operation returns [`Error`]. The variants are the
//! distinct conditions a caller may want to handle separately: a damaged
//! model file, a file written by a newer format, an unreadable source, and a
//! feature matrix that does not fit the loaded model.

use thiserror::Error;

use crate::io::{DeserializeError, SerializeError, CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR};

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by loading, importing, and evaluating models.
#[derive(Debug, Error)]
pub enum Error {
    /// The model bytes are malformed or fail structural validation.
    #[error("corrupt model: {0}")]
    CorruptModel(String),

    /// The model was written by a newer format version.
    #[error(
        "unsupported model format {major}.{minor} (this build reads up to {}.{})",
        CURRENT_VERSION_MAJOR,
        CURRENT_VERSION_MINOR
    )]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The model source could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-provided features do not match the model's expectations.
    #[error(transparent)]
    FeatureShape(#[from] FeatureShapeError),

    /// A foreign model uses a construct this engine does not evaluate.
    #[error("unsupported model construct: {0}")]
    Unsupported(String),

    /// Invalid evaluator configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptModel(msg.into())
    }
}

impl From<DeserializeError> for Error {
    fn from(err: DeserializeError) -> Self {
        match err {
            DeserializeError::UnsupportedVersion { major, minor } => {
                Self::UnsupportedVersion { major, minor }
            }
            DeserializeError::Io(e) => Self::Io(e),
            other => Self::CorruptModel(other.to_string()),
        }
    }
}

impl From<SerializeError> for Error {
    fn from(err: SerializeError) -> Self {
        match err {
            SerializeError::Io(e) => Self::Io(e),
            other => Self::CorruptModel(other.to_string()),
        }
    }
}

/// Shape mismatches between caller data and a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureShapeError {
    /// Numeric and categorical matrices disagree on the number of rows.
    #[error("row count mismatch: {numeric} numeric rows vs {categorical} categorical rows")]
    RowCountMismatch { numeric: usize, categorical: usize },

    /// Numeric matrix has the wrong number of columns.
    #[error("expected {expected} numeric feature columns, got {actual}")]
    NumericColumns { expected: usize, actual: usize },

    /// Categorical matrix has the wrong number of columns.
    #[error("expected {expected} categorical feature columns, got {actual}")]
    CategoricalColumns { expected: usize, actual: usize },

    /// Mixed row matrix has the wrong total number of columns.
    #[error("expected {expected} feature columns, got {actual}")]
    TotalColumns { expected: usize, actual: usize },

    /// A mixed row holds a token in a numeric column or vice versa.
    #[error("row {row}, column {column}: expected a {expected} value")]
    ValueKind {
        row: usize,
        column: usize,
        expected: &'static str,
    },

    /// Categorical feature index outside the model's declared range.
    #[error("categorical feature {index} out of range (model has {count})")]
    CategoricalFeatureOutOfRange { index: usize, count: usize },
}

/// Evaluator configuration rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Block size must be at least 1.
    #[error("block_size must be at least 1")]
    ZeroBlockSize,

    /// A categorical column index appears twice.
    #[error("categorical column {0} listed more than once")]
    DuplicateCategoricalIndex(usize),

    /// A categorical column index points past the last feature column.
    #[error("categorical column {index} out of range for {n_columns} feature columns")]
    CategoricalIndexOutOfRange { index: usize, n_columns: usize },

    /// Number of categorical columns disagrees with the model.
    #[error("config lists {configured} categorical columns but the model has {expected}")]
    CategoricalCountMismatch { configured: usize, expected: usize },
}
