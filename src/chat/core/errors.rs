//! Error types for the chat subsystem.

use thiserror::Error;

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A required field is missing or empty.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        kind: &'static str,
        /// Identifier that was not found.
        id: String,
    },
    /// A storage tier failed to open, read or write.
    #[error("storage tier {tier} unavailable: {reason}")]
    StorageUnavailable {
        /// Tier name.
        tier: &'static str,
        /// Underlying failure.
        reason: String,
    },
    /// A multi-statement transaction failed and was rolled back.
    #[error("transaction failed: {0}")]
    TransactionFailure(String),
    /// Every client storage tier is unavailable.
    #[error("all storage tiers are unavailable; session is not persisted")]
    Exhausted,
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Non-success response from the remote service.
    #[error("remote service returned {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP client error.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl ChatError {
    /// Build a `NotFound` error for a conversation id.
    #[must_use]
    pub fn conversation_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "conversation",
            id: id.to_string(),
        }
    }

    /// Wrap any failure as a `StorageUnavailable` for the named tier.
    #[must_use]
    pub fn unavailable(tier: &'static str, reason: impl ToString) -> Self {
        Self::StorageUnavailable {
            tier,
            reason: reason.to_string(),
        }
    }

    /// Wrap a database failure that aborted a transaction.
    #[must_use]
    pub fn transaction(err: impl ToString) -> Self {
        Self::TransactionFailure(err.to_string())
    }

    /// Whether this error is a caller mistake rather than a system fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ChatError::conversation_not_found("abc");
        assert_eq!(err.to_string(), "conversation not found: abc");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_storage_errors_are_not_client_errors() {
        assert!(!ChatError::unavailable("durable", "disk gone").is_client_error());
        assert!(!ChatError::Exhausted.is_client_error());
        assert!(!ChatError::transaction("busy").is_client_error());
    }
}
