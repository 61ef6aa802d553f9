//! Error types for the catalog provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Catalog provider errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// API key rejected
    #[error("Catalog rejected credentials (status {status_code})")]
    Unauthorized { status_code: u16 },

    /// API request returned an error
    #[error("Catalog API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limit still exceeded after retries
    #[error("Rate limit exceeded{}", .retry_after_seconds.map(|s| format!(", retry after {} seconds", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after_seconds: Option<u64> },

    /// Failed to parse API response
    #[error("Failed to parse catalog response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<CatalogError> for BridgeError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CatalogError::ApiError {
            status_code: 404,
            message: "relation does not exist".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Catalog API error (status 404): relation does not exist"
        );

        let error = CatalogError::RateLimitExceeded {
            retry_after_seconds: Some(30),
        };
        assert_eq!(error.to_string(), "Rate limit exceeded, retry after 30 seconds");
    }

    #[test]
    fn test_error_conversion() {
        let bridge_error: BridgeError = CatalogError::Unauthorized { status_code: 401 }.into();
        assert!(matches!(bridge_error, BridgeError::OperationFailed(msg) if msg.contains("401")));

        let bridge_error: BridgeError =
            CatalogError::BridgeError(BridgeError::NotAvailable("offline".into())).into();
        assert!(matches!(bridge_error, BridgeError::NotAvailable(_)));
    }
}
