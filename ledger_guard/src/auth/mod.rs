//! Authentication module providing registration, login and session management.
//!
//! This module implements:
//! - Argon2id password hashing with server-side pepper
//! - HS256 JWT access tokens (15-minute expiry by default)
//! - Rotating opaque refresh tokens with reuse detection (7-day expiry)
//! - Single-use password reset tokens
//! - The bearer/admin admission gate used by the HTTP layer
//!
//! ## Example
//!
//! ```no_run
//! use ledger_guard::auth::{AuthConfig, AuthManager, ClientContext, RegisterRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::new("a-signing-secret-of-at-least-32-chars", "pepper");
//!     let auth = AuthManager::in_memory(&config);
//!
//!     let request = RegisterRequest {
//!         email: "owner@example.com".to_string(),
//!         password: "SecurePass123".to_string(),
//!         name: Some("Owner".to_string()),
//!     };
//!
//!     let session = auth.register(request, &ClientContext::default()).await?;
//!     println!("Registered user {}", session.user.id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod gate;
pub mod manager;
pub mod models;
pub mod passwords;
pub mod reset;
pub mod sessions;
pub mod tokens;

pub use config::{AdminPolicy, AuthConfig};
pub use errors::{AuthError, AuthResult};
pub use gate::{AccessGate, BEARER_PREFIX, GateRejection, GateRequirement};
pub use manager::AuthManager;
pub use models::{
    AccessTokenClaims, AuthSession, AuthenticatedUser, ClientContext, LoginRequest,
    RefreshTokenRecord, RegisterRequest, ResetTokenRecord, TokenPair, User, UserCredentials,
    UserId,
};
pub use passwords::PasswordHasher;
pub use reset::{LogResetNotifier, PasswordResetManager, ResetNotifier};
pub use sessions::SessionService;
pub use tokens::{ACCESS_TOKEN_ALGORITHM, TokenService};
