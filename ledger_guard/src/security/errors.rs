//! Error types for security module

use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimiterResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Budget with a zero maximum or zero window
    #[error("Invalid rate limit budget: {0}")]
    InvalidBudget(String),

    /// Stored counter value outside the representable range
    #[error("Corrupt counter for {key}: {value}")]
    CorruptCounter { key: String, value: i64 },
}
