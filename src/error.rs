//! Error types for CloudVault.

use thiserror::Error;

/// Common error type for CloudVault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant with their message.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error (connection refused, TLS failure, timeout...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A collaborator refused the request (quota exceeded, validation failure...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The object store answered a PUT with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Webhook signature missing or mismatched.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A queued task was dropped before it could report a result.
    #[error("queued task dropped before completion")]
    TaskDropped,
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        VaultError::Http(e.to_string())
    }
}

/// Result type alias for CloudVault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_error_display() {
        let err = VaultError::Rejected("storage quota exceeded".to_string());
        assert_eq!(err.to_string(), "request rejected: storage quota exceeded");
    }

    #[test]
    fn test_status_error_display() {
        let err = VaultError::Status(403);
        assert_eq!(err.to_string(), "unexpected HTTP status 403");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = VaultError::NotFound("pending upload".to_string());
        assert_eq!(err.to_string(), "pending upload not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VaultError = io_err.into();
        assert!(matches!(err, VaultError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: VaultError = parse_err.into();
        assert!(matches!(err, VaultError::Serialization(_)));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(VaultError::InvalidSignature)
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
