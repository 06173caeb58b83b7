//! Repository trait definitions for testability and dependency injection.
//!
//! Every store operation that has to be atomic is a single trait method, so
//! each backend can implement it with its own primitive (a map lock in memory,
//! a conditional `UPDATE` inside a transaction in Postgres).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::{
    AuthResult, RefreshTokenRecord, ResetTokenRecord, User, UserCredentials, UserId,
};

/// Credential store operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    ///
    /// # Errors
    ///
    /// * `AuthError::EmailTaken` - A user with this email already exists
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> AuthResult<User>;

    /// Find user and password hash by (normalized) email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserCredentials>>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;
}

/// Refresh token persistence
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> AuthResult<()>;

    async fn find_refresh_token(&self, token_hash: &str)
    -> AuthResult<Option<RefreshTokenRecord>>;

    /// Retire `old_id` and insert `replacement` as one atomic step.
    ///
    /// Returns `false` without inserting anything when `old_id` is unknown or
    /// was already revoked, i.e. another rotation won the race.
    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Revoke a single record. Returns `true` if this call revoked it.
    async fn revoke_refresh_token(&self, id: Uuid, now: DateTime<Utc>) -> AuthResult<bool>;

    /// Revoke every non-revoked record owned by `user_id`, returning how many changed.
    async fn revoke_all_refresh_tokens(&self, user_id: UserId, now: DateTime<Utc>)
    -> AuthResult<u64>;
}

/// Password reset token persistence
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> AuthResult<()>;

    /// Consume an unused, unexpired reset token and store the new password hash
    /// for its owner, atomically.
    ///
    /// Returns the owner on success and `None` when no usable token matched.
    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>>;
}
