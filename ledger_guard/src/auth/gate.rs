//! Admission decisions for bearer-authenticated requests.
//!
//! The HTTP layer extracts the `Authorization` header and asks the
//! [`AccessGate`] whether the request may proceed. Rejections carry no detail
//! about which check failed beyond the 401/403 distinction.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{config::AdminPolicy, models::AuthenticatedUser, tokens::TokenService};

/// Only accepted authorization scheme prefix (case-sensitive)
pub const BEARER_PREFIX: &str = "Bearer ";

/// What a route requires of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRequirement {
    Authenticated,
    Admin,
}

/// Why a request was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// No `Authorization` header
    MissingCredential,
    /// Header present but not `Bearer <token>`
    MalformedCredential,
    /// Token failed validation
    InvalidCredential,
    /// Valid identity that is not an administrator
    InsufficientPrivilege,
}

impl GateRejection {
    /// 403 rather than 401
    pub fn is_forbidden(self) -> bool {
        matches!(self, GateRejection::InsufficientPrivilege)
    }

    pub fn message(self) -> &'static str {
        match self {
            GateRejection::MissingCredential | GateRejection::MalformedCredential => {
                "Missing or invalid authorization header"
            }
            GateRejection::InvalidCredential => "Invalid or expired token",
            GateRejection::InsufficientPrivilege => "Insufficient privileges",
        }
    }
}

/// Composes the token validator with the administrator allow-list
#[derive(Clone)]
pub struct AccessGate {
    tokens: Arc<TokenService>,
    admins: AdminPolicy,
}

impl AccessGate {
    pub fn new(tokens: Arc<TokenService>, admins: AdminPolicy) -> Self {
        Self { tokens, admins }
    }

    pub fn admins(&self) -> &AdminPolicy {
        &self.admins
    }

    /// Extract the token from an `Authorization` header value
    pub fn bearer_token(header: &str) -> Result<&str, GateRejection> {
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(GateRejection::MalformedCredential)?;

        if token.is_empty() || token.starts_with(char::is_whitespace) {
            return Err(GateRejection::MalformedCredential);
        }
        Ok(token)
    }

    /// Decide whether a request with the given `Authorization` header is admitted
    pub fn admit(
        &self,
        authorization: Option<&str>,
        requirement: GateRequirement,
    ) -> Result<AuthenticatedUser, GateRejection> {
        self.admit_at(authorization, requirement, Utc::now())
    }

    pub fn admit_at(
        &self,
        authorization: Option<&str>,
        requirement: GateRequirement,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedUser, GateRejection> {
        let header = authorization.ok_or(GateRejection::MissingCredential)?;
        let token = Self::bearer_token(header)?;

        let user: AuthenticatedUser = self
            .tokens
            .verify_access_token_at(token, now)
            .map_err(|_| GateRejection::InvalidCredential)?
            .into();

        if requirement == GateRequirement::Admin && !self.admins.is_admin(&user.email) {
            log::debug!(
                "Admin access denied: user_id={} email={}",
                user.user_id,
                user.email
            );
            return Err(GateRejection::InsufficientPrivilege);
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn gate() -> (AccessGate, Arc<TokenService>) {
        let tokens = Arc::new(TokenService::new(
            b"gate_test_secret_0123456789abcdefghij",
            Duration::minutes(15),
        ));
        let gate = AccessGate::new(tokens.clone(), AdminPolicy::single("Admin@Example.com"));
        (gate, tokens)
    }

    #[test]
    fn test_bearer_prefix_is_case_sensitive() {
        assert_eq!(AccessGate::bearer_token("Bearer abc"), Ok("abc"));
        for header in ["bearer abc", "BEARER abc", "Basic abc", "Bearer", "Bearer ", "Bearer  abc", "abc"] {
            assert_eq!(
                AccessGate::bearer_token(header),
                Err(GateRejection::MalformedCredential),
                "{header:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_missing_header_rejected() {
        let (gate, _) = gate();
        assert_eq!(
            gate.admit(None, GateRequirement::Authenticated),
            Err(GateRejection::MissingCredential)
        );
    }

    #[test]
    fn test_valid_token_admitted() {
        let (gate, tokens) = gate();
        let token = tokens.issue_access_token(5, "user@example.com").unwrap();
        let header = format!("Bearer {token}");

        let user = gate
            .admit(Some(&header), GateRequirement::Authenticated)
            .unwrap();
        assert_eq!(user.user_id, 5);
        assert_eq!(user.email, "user@example.com");
    }

    #[test]
    fn test_expired_token_rejected() {
        let (gate, tokens) = gate();
        let issued = Utc::now();
        let token = tokens
            .issue_access_token_at(5, "user@example.com", issued)
            .unwrap();
        let header = format!("Bearer {token}");

        assert_eq!(
            gate.admit_at(
                Some(&header),
                GateRequirement::Authenticated,
                issued + Duration::minutes(15)
            ),
            Err(GateRejection::InvalidCredential)
        );
    }

    #[test]
    fn test_admin_requirement() {
        let (gate, tokens) = gate();

        let user_token = tokens.issue_access_token(5, "user@example.com").unwrap();
        let rejection = gate
            .admit(Some(&format!("Bearer {user_token}")), GateRequirement::Admin)
            .unwrap_err();
        assert_eq!(rejection, GateRejection::InsufficientPrivilege);
        assert!(rejection.is_forbidden());

        let admin_token = tokens.issue_access_token(1, "admin@example.com").unwrap();
        assert!(
            gate.admit(Some(&format!("Bearer {admin_token}")), GateRequirement::Admin)
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_token_beats_admin_check() {
        let (gate, _) = gate();
        let rejection = gate
            .admit(Some("Bearer not.a.jwt"), GateRequirement::Admin)
            .unwrap_err();
        assert_eq!(rejection, GateRejection::InvalidCredential);
        assert!(!rejection.is_forbidden());
    }
}
