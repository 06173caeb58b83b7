//! # Ledger Guard
//!
//! Session, token and request-throttling core for the ledger service.
//!
//! Everything that decides whether a request may touch business data lives
//! here; the HTTP binding lives in `lg_server`.
//!
//! ## Core Modules
//!
//! - [`auth`]: Credential checks, access/refresh tokens, password reset and the admission gate
//! - [`db`]: Repository traits with in-memory and PostgreSQL backends
//! - [`security`]: Fixed-window rate limiting
//!
//! ## Example
//!
//! ```
//! use ledger_guard::security::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::in_memory(RateLimitConfig::default());
//! assert_eq!(limiter.config().auth.max_requests, 20);
//! ```

/// Authentication, session and token management.
pub mod auth;

/// Storage backends.
pub mod db;

/// Rate limiting.
pub mod security;

pub use auth::{AuthError, AuthManager, AuthResult};
pub use security::{RateLimitPolicy, RateLimiter};
