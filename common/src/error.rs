//! Error types shared across the Ratecast workspace.

use thiserror::Error;

/// Errors raised while parsing shared value types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Input is not a three-letter currency code.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),
}

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;
