//! FX error types.

use std::time::Duration;

use ratecast_common::{CommonError, CurrencyPair};
use thiserror::Error;

/// Errors that can occur in the rate pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FxError {
    /// Provider call exceeded its deadline.
    #[error("Rate provider timed out after {0:?}")]
    Timeout(Duration),

    /// Transport failure or non-success HTTP status.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered but reported a failure.
    #[error("Rate provider error: {0}")]
    ProviderError(String),

    /// Provider answered with a body we cannot interpret.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// No valid snapshot is cached.
    #[error("Rates not ready")]
    CacheEmpty,

    /// Caller supplied something that is not a currency code.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    /// Caller supplied a negative or non-finite amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Snapshot has no usable rate for the pair.
    #[error("Rate not available for {0}")]
    RateUnavailable(CurrencyPair),
}

impl FxError {
    /// Check if this error comes from the upstream side and may clear on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FxError::Timeout(_)
                | FxError::Network(_)
                | FxError::ProviderError(_)
                | FxError::MalformedResponse(_)
        )
    }

    /// Whether the caller's input was rejected before touching the cache.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FxError::InvalidCurrencyCode(_) | FxError::InvalidAmount(_)
        )
    }

    /// Get error code for logs and API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::Timeout(_) => "TIMEOUT",
            FxError::Network(_) => "NETWORK_ERROR",
            FxError::ProviderError(_) => "PROVIDER_ERROR",
            FxError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            FxError::CacheEmpty => "NOT_READY",
            FxError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            FxError::InvalidAmount(_) => "INVALID_AMOUNT",
            FxError::RateUnavailable(_) => "RATE_UNAVAILABLE",
        }
    }
}

impl From<CommonError> for FxError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::InvalidCurrencyCode(code) => FxError::InvalidCurrencyCode(code),
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
