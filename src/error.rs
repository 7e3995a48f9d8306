//! Error taxonomy shared by the lifecycle managers and the HTTP surface.

use thiserror::Error;

/// Errors surfaced by the core operations.
///
/// Every variant except `Database` and `Internal` is a client error and is
/// reported as a rejected request; nothing is retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or out-of-range input, or an invalid state transition.
    #[error("{0}")]
    Validation(String),

    /// Entity missing or not owned by the caller.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate request (pending subscription, email in use, ...).
    #[error("{0}")]
    Conflict(String),

    /// Caller lacks the role or entitlement for the operation.
    #[error("{0}")]
    Forbidden(String),

    /// Missing or unknown caller identity.
    #[error("{0}")]
    Unauthenticated(String),

    /// Debit exceeds the current balance.
    #[error("{0}")]
    InsufficientFunds(String),

    /// An external collaborator (mail delivery) failed.
    #[error("{0}")]
    Dependency(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientFunds(msg.into())
    }

    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            CoreError::Database(_) | CoreError::Internal(_) | CoreError::Dependency(_)
        )
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(CoreError::validation("bad amount").is_client_error());
        assert!(CoreError::insufficient("low").is_client_error());
        assert!(!CoreError::Dependency("smtp down".into()).is_client_error());
        assert!(!CoreError::Internal(anyhow::anyhow!("boom")).is_client_error());
    }

    #[test]
    fn test_message_is_passed_through() {
        let err = CoreError::not_found("Trade not found or not active");
        assert_eq!(err.to_string(), "Trade not found or not active");
    }
}
