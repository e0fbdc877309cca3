//! Error types for lisagis

use thiserror::Error;

/// Main error type for lisagis operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A unit ended up with no neighbors after graph construction.
    #[error("Incomplete neighborhood: unit {unit} has no neighbors")]
    IncompleteNeighborhood { unit: usize },

    /// The attribute vector cannot support the statistic (zero variance).
    #[error("Degenerate input: {reason}")]
    DegenerateInput { reason: String },

    #[error("Non-finite value {value} at unit {unit}")]
    NonFiniteValue { unit: usize, value: f64 },

    #[error("Size mismatch: expected {expected} units, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Insufficient units: need at least {required}, got {found}")]
    InsufficientUnits { required: usize, found: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for lisagis operations
pub type Result<T> = std::result::Result<T, Error>;
