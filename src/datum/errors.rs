//! Datum conversion errors.

use thiserror::Error;

/// Result type for datum conversions
pub type DatumResult<T> = Result<T, DatumError>;

/// Errors produced while converting a decoded document into a datum
#[derive(Debug, Clone, Error)]
pub enum DatumError {
    /// Array exceeds the configured element limit
    #[error("Array of {size} elements exceeds the limit of {limit}")]
    ArrayTooLarge { size: usize, limit: usize },

    /// Non-finite numbers cannot be represented
    #[error("Number {0} is not finite")]
    NonFiniteNumber(f64),

    /// A time-tagged object was missing or had a malformed epoch field
    #[error("Malformed time value: {0}")]
    MalformedTime(String),
}
