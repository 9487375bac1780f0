//! Error types for market data operations

use thiserror::Error;

/// Failure of a data-provider call
///
/// Agent tasks never propagate these; a failed sub-fetch becomes a missing
/// input in the prompt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Response could not be decoded
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::JsonError(err.to_string())
    }
}

/// Result type alias for data operations
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::InvalidSymbol("INVALID".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: INVALID");

        let err = DataError::DataUnavailable {
            symbol: "AAPL".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: DataError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, DataError::JsonError(_)));
    }
}
