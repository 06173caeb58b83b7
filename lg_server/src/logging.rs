//! Structured logging configuration.
//!
//! `tracing-subscriber` also installs the `log` bridge, so records emitted by
//! `ledger_guard` through the `log` facade land in the same output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter, which keeps the pool and HTTP
/// stacks at warn.
///
/// ```no_run
/// lg_server::logging::init();
/// tracing::info!("Server starting");
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,tower_http=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    tracing::debug!("Logging initialized");
}

/// Security-relevant events emitted by the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    FailedLogin,
    /// A retired refresh token was presented and its owner's sessions revoked
    RefreshTokenReuse,
    InvalidAccessToken,
    AdminDenied,
    RateLimited,
}

impl SecurityEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityEvent::FailedLogin => "failed_login",
            SecurityEvent::RefreshTokenReuse => "refresh_token_reuse",
            SecurityEvent::InvalidAccessToken => "invalid_access_token",
            SecurityEvent::AdminDenied => "admin_denied",
            SecurityEvent::RateLimited => "rate_limited",
        }
    }
}

/// Emit a security event at warn level with structured fields.
///
/// Never pass tokens or passwords in `message`.
///
/// # Example
///
/// ```
/// use lg_server::logging::{SecurityEvent, log_security_event};
///
/// log_security_event(
///     SecurityEvent::FailedLogin,
///     None,
///     Some("192.168.1.1"),
///     "Invalid credentials",
/// );
/// ```
pub fn log_security_event(
    event: SecurityEvent,
    user_id: Option<i64>,
    ip_address: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        security_event = event.as_str(),
        user_id,
        ip_address,
        "{}",
        message
    );
}
