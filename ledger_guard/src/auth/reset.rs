//! Password reset tokens.
//!
//! A reset token is independent of the session system: it is issued on
//! request, delivered out of band through a [`ResetNotifier`] and redeemed at
//! most once. Redemption replaces the password and revokes every refresh token
//! of the account.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    config::expiry_after,
    errors::{AuthError, AuthResult},
    models::{ResetTokenRecord, User, UserId},
    passwords::{PasswordHasher, normalize_email, validate_password},
    tokens::{generate_opaque_token, hash_token},
};
use crate::db::{RefreshTokenStore, ResetTokenStore, UserRepository};

/// Out-of-band delivery of reset tokens (email, SMS, ...)
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_token(
        &self,
        user: &User,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<()>;
}

/// Notifier that only writes to the log.
///
/// The token itself is logged at debug level for local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResetNotifier;

#[async_trait]
impl ResetNotifier for LogResetNotifier {
    async fn send_reset_token(
        &self,
        user: &User,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        log::info!(
            "Password reset issued: user_id={} expires_at={}",
            user.id,
            expires_at
        );
        log::debug!("Password reset token for {}: {}", user.email, token);
        Ok(())
    }
}

/// Issues and redeems single-use password reset tokens
#[derive(Clone)]
pub struct PasswordResetManager {
    users: Arc<dyn UserRepository>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    hasher: PasswordHasher,
    notifier: Arc<dyn ResetNotifier>,
    reset_token_ttl: Duration,
}

impl PasswordResetManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        hasher: PasswordHasher,
        notifier: Arc<dyn ResetNotifier>,
        reset_token_ttl: Duration,
    ) -> Self {
        Self {
            users,
            reset_tokens,
            refresh_tokens,
            hasher,
            notifier,
            reset_token_ttl,
        }
    }

    /// Issue a reset token for `email` and hand it to the notifier.
    ///
    /// Unknown or malformed emails are a silent no-op, and delivery failures
    /// are logged rather than returned, so the outcome never reveals which
    /// addresses are registered.
    pub async fn request_reset(&self, email: &str) -> AuthResult<()> {
        let now = Utc::now();
        let expires_at = expiry_after(now, self.reset_token_ttl, "reset")?;

        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };
        let Some(credentials) = self.users.find_by_email(&email).await? else {
            log::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_opaque_token();
        let record = ResetTokenRecord {
            id: Uuid::new_v4(),
            user_id: credentials.user.id,
            token_hash: hash_token(&token),
            created_at: now,
            expires_at,
            used: false,
        };
        self.reset_tokens.insert_reset_token(&record).await?;

        if let Err(e) = self
            .notifier
            .send_reset_token(&credentials.user, &token, expires_at)
            .await
        {
            log::warn!(
                "Failed to deliver password reset for user {}: {}",
                credentials.user.id,
                e
            );
        }
        Ok(())
    }

    /// Redeem a reset token and set a new password
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidInput` - New password is too weak
    /// * `AuthError::InvalidResetToken` - Token unknown, expired or already used
    pub async fn redeem_reset(&self, token: &str, new_password: &str) -> AuthResult<UserId> {
        self.redeem_reset_at(token, new_password, Utc::now()).await
    }

    pub async fn redeem_reset_at(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<UserId> {
        validate_password(new_password)?;
        let password_hash = self.hasher.hash(new_password)?;

        let user_id = self
            .reset_tokens
            .redeem_reset_token(&hash_token(token), &password_hash, now)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let revoked = self
            .refresh_tokens
            .revoke_all_refresh_tokens(user_id, now)
            .await?;
        log::info!(
            "Password reset completed: user_id={} sessions_revoked={}",
            user_id,
            revoked
        );

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        tokens: Mutex<Vec<(UserId, String)>>,
    }

    #[async_trait]
    impl ResetNotifier for RecordingNotifier {
        async fn send_reset_token(
            &self,
            user: &User,
            token: &str,
            _expires_at: DateTime<Utc>,
        ) -> AuthResult<()> {
            self.tokens.lock().await.push((user.id, token.to_string()));
            Ok(())
        }
    }

    async fn setup() -> (PasswordResetManager, Arc<MemoryStore>, Arc<RecordingNotifier>, User) {
        let store = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::new("test_pepper_value");
        let old_hash = hasher.hash("OldPassword1").unwrap();
        let user = store
            .create_user("reset@example.com", &old_hash, None)
            .await
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = PasswordResetManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            hasher,
            notifier.clone(),
            Duration::hours(1),
        );
        (manager, store, notifier, user)
    }

    #[tokio::test]
    async fn test_unknown_email_is_silent() {
        let (manager, _, notifier, _) = setup().await;
        manager.request_reset("nobody@example.com").await.unwrap();
        manager.request_reset("not an email").await.unwrap();
        assert!(notifier.tokens.lock().await.is_empty());
    }

    struct FailingNotifier;

    #[async_trait]
    impl ResetNotifier for FailingNotifier {
        async fn send_reset_token(
            &self,
            _user: &User,
            _token: &str,
            _expires_at: DateTime<Utc>,
        ) -> AuthResult<()> {
            Err(AuthError::Storage("mail relay unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_looks_like_success() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_user("known@example.com", "hash", None)
            .await
            .unwrap();
        let manager = PasswordResetManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            PasswordHasher::new("test_pepper_value"),
            Arc::new(FailingNotifier),
            Duration::hours(1),
        );

        assert!(manager.request_reset("known@example.com").await.is_ok());
        assert!(manager.request_reset("unknown@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_token_single_use() {
        let (manager, store, notifier, user) = setup().await;
        manager.request_reset("Reset@Example.com").await.unwrap();
        let (owner, token) = notifier.tokens.lock().await[0].clone();
        assert_eq!(owner, user.id);

        assert_eq!(manager.redeem_reset(&token, "NewPassword1").await.unwrap(), user.id);
        assert!(matches!(
            manager.redeem_reset(&token, "OtherPassword2").await,
            Err(AuthError::InvalidResetToken)
        ));

        let credentials = store
            .find_by_email("reset@example.com")
            .await
            .unwrap()
            .unwrap();
        let hasher = PasswordHasher::new("test_pepper_value");
        assert!(hasher.verify("NewPassword1", &credentials.password_hash).is_ok());
        assert!(hasher.verify("OldPassword1", &credentials.password_hash).is_err());
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let (manager, _, notifier, _) = setup().await;
        manager.request_reset("reset@example.com").await.unwrap();
        let (_, token) = notifier.tokens.lock().await[0].clone();

        let later = Utc::now() + Duration::hours(1) + Duration::seconds(1);
        assert!(matches!(
            manager.redeem_reset_at(&token, "NewPassword1", later).await,
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[tokio::test]
    async fn test_weak_password_does_not_consume_token() {
        let (manager, _, notifier, user) = setup().await;
        manager.request_reset("reset@example.com").await.unwrap();
        let (_, token) = notifier.tokens.lock().await[0].clone();

        assert!(matches!(
            manager.redeem_reset(&token, "weak").await,
            Err(AuthError::InvalidInput { field: "password", .. })
        ));
        assert_eq!(manager.redeem_reset(&token, "NewPassword1").await.unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_reset_revokes_refresh_tokens() {
        let (manager, store, notifier, user) = setup().await;
        let now = Utc::now();
        store
            .insert_refresh_token(&crate::auth::RefreshTokenRecord {
                id: Uuid::new_v4(),
                token_hash: "session".to_string(),
                user_id: user.id,
                issued_at: now,
                expires_at: now + Duration::days(7),
                revoked: false,
                revoked_at: None,
                user_agent: None,
                ip_address: None,
            })
            .await
            .unwrap();

        manager.request_reset("reset@example.com").await.unwrap();
        let (_, token) = notifier.tokens.lock().await[0].clone();
        manager.redeem_reset(&token, "NewPassword1").await.unwrap();

        assert!(
            store
                .refresh_tokens_for_user(user.id)
                .await
                .iter()
                .all(|r| r.revoked)
        );
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let (manager, _, _, _) = setup().await;
        assert!(matches!(
            manager.redeem_reset("garbage", "NewPassword1").await,
            Err(AuthError::InvalidResetToken)
        ));
    }
}
