//! Authentication error types.

use thiserror::Error;

use super::models::UserId;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storage backend invariant violated
    #[error("Storage error: {0}")]
    Storage(String),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Email or password did not match a registered user
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Email already registered
    #[error("Email already registered")]
    EmailTaken,

    /// Request body failed validation
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    /// Access or refresh token failed validation
    #[error("Invalid or expired token")]
    InvalidToken,

    /// A retired refresh token was presented again
    #[error("Refresh token reuse detected for user {user_id}")]
    ReuseDetected { user_id: UserId },

    /// Reset token unknown, expired or already used
    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    /// Authenticated identity lacks the required capability
    #[error("Insufficient privileges")]
    Forbidden,

    /// A configured lifetime pushed an expiry past the representable range
    #[error("Token lifetime out of range: {0}")]
    LifetimeOutOfRange(&'static str),

    /// JWT signing error
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage, hashing and signing errors are sanitized, and reuse detection
    /// collapses into the generic token failure so the client cannot tell a
    /// retired token from a forged one.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Database(_)
            | AuthError::Storage(_)
            | AuthError::HashingFailed
            | AuthError::LifetimeOutOfRange(_)
            | AuthError::JwtError(_) => "Internal server error".to_string(),
            AuthError::ReuseDetected { .. } => AuthError::InvalidToken.to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the error is caused by the server rather than the request
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Database(_)
                | AuthError::Storage(_)
                | AuthError::HashingFailed
                | AuthError::LifetimeOutOfRange(_)
                | AuthError::JwtError(_)
        )
    }

    pub(crate) fn invalid_input(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
