//! Authentication configuration.

use chrono::{DateTime, Duration, Utc};

use super::errors::{AuthError, AuthResult};
use std::collections::HashSet;

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Default refresh token lifetime (7 days)
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Default password reset token lifetime (1 hour)
pub const DEFAULT_RESET_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Longest accepted lifetime for any token (10 years)
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Secrets and lifetimes injected into the token services at construction.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for access token signing
    pub jwt_secret: String,
    /// Server-side pepper appended to passwords before hashing
    pub password_pepper: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub reset_token_ttl: Duration,
}

impl AuthConfig {
    /// Create a configuration with the default token lifetimes
    pub fn new(jwt_secret: impl Into<String>, password_pepper: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            password_pepper: password_pepper.into(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            reset_token_ttl: Duration::seconds(DEFAULT_RESET_TOKEN_TTL_SECS),
        }
    }
}

/// Expiry of a token of lifetime `ttl` issued at `now`
pub(crate) fn expiry_after(
    now: DateTime<Utc>,
    ttl: Duration,
    token: &'static str,
) -> AuthResult<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or(AuthError::LifetimeOutOfRange(token))
}

// Secrets stay out of debug output.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("password_pepper", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("reset_token_ttl", &self.reset_token_ttl)
            .finish()
    }
}

/// Administrator allow-list consulted by the admin gate.
///
/// Emails are compared case-insensitively. An empty list admits nobody.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    emails: HashSet<String>,
}

impl AdminPolicy {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Policy with a single designated administrator
    pub fn single(email: &str) -> Self {
        Self::new([email])
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthConfig::new("super-secret-signing-key", "pepper-value");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-signing-key"));
        assert!(!debug.contains("pepper-value"));
    }

    #[test]
    fn test_expiry_after_rejects_overflow() {
        let now = Utc::now();
        assert_eq!(
            expiry_after(now, Duration::minutes(15), "access").unwrap(),
            now + Duration::minutes(15)
        );
        assert!(matches!(
            expiry_after(now, Duration::MAX, "access"),
            Err(AuthError::LifetimeOutOfRange("access"))
        ));
    }

    #[test]
    fn test_admin_policy_is_case_insensitive() {
        let policy = AdminPolicy::single("Admin@Example.com");
        assert!(policy.is_admin("admin@example.com"));
        assert!(policy.is_admin(" ADMIN@EXAMPLE.COM "));
        assert!(!policy.is_admin("user@example.com"));
    }

    #[test]
    fn test_empty_admin_policy_admits_nobody() {
        let policy = AdminPolicy::new(["", "  "]);
        assert!(policy.is_empty());
        assert!(!policy.is_admin(""));
    }
}
