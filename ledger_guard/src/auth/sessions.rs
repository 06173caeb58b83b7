//! Refresh token issuing, rotation and revocation.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    config::expiry_after,
    errors::{AuthError, AuthResult},
    models::{ClientContext, RefreshTokenRecord, TokenPair, User, UserId},
    tokens::{TokenService, generate_opaque_token, hash_token},
};
use crate::db::{RefreshTokenStore, UserRepository};

/// Issues token pairs and manages the refresh token lifecycle
#[derive(Clone)]
pub struct SessionService {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    refresh_token_ttl: Duration,
}

impl SessionService {
    pub fn new(
        tokens: Arc<TokenService>,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        refresh_token_ttl: Duration,
    ) -> Self {
        Self {
            tokens,
            users,
            refresh_tokens,
            refresh_token_ttl,
        }
    }

    fn new_refresh_record(
        &self,
        user_id: UserId,
        ctx: &ClientContext,
        now: DateTime<Utc>,
    ) -> AuthResult<(String, RefreshTokenRecord)> {
        let secret = generate_opaque_token();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&secret),
            user_id,
            issued_at: now,
            expires_at: expiry_after(now, self.refresh_token_ttl, "refresh")?,
            revoked: false,
            revoked_at: None,
            user_agent: ctx.user_agent.clone(),
            ip_address: ctx.ip_address.clone(),
        };
        Ok((secret, record))
    }

    fn pair(&self, user: &User, refresh_token: String, now: DateTime<Utc>) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.tokens.issue_access_token_at(user.id, &user.email, now)?,
            refresh_token,
            expires_in: self.tokens.access_token_ttl_secs(),
        })
    }

    /// Issue a fresh token pair for a verified user
    pub async fn issue(&self, user: &User, ctx: &ClientContext) -> AuthResult<TokenPair> {
        self.issue_at(user, ctx, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        user: &User,
        ctx: &ClientContext,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenPair> {
        let (secret, record) = self.new_refresh_record(user.id, ctx, now)?;
        // Sign first so a signing failure leaves no orphaned refresh record.
        let pair = self.pair(user, secret, now)?;
        self.refresh_tokens.insert_refresh_token(&record).await?;

        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, retiring the presented one
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Unknown or expired token, or its owner no longer exists
    /// * `AuthError::ReuseDetected` - The token was already rotated or revoked; every
    ///   refresh token of its owner has been revoked
    pub async fn rotate(&self, refresh_token: &str, ctx: &ClientContext) -> AuthResult<TokenPair> {
        self.rotate_at(refresh_token, ctx, Utc::now()).await
    }

    pub async fn rotate_at(
        &self,
        refresh_token: &str,
        ctx: &ClientContext,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenPair> {
        let record = self
            .refresh_tokens
            .find_refresh_token(&hash_token(refresh_token))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if record.revoked {
            return Err(self.reuse_detected(record.user_id, now).await);
        }
        if record.expires_at <= now {
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let (secret, replacement) = self.new_refresh_record(user.id, ctx, now)?;
        let pair = self.pair(&user, secret, now)?;

        if !self
            .refresh_tokens
            .rotate_refresh_token(record.id, &replacement, now)
            .await?
        {
            // Lost the race against a concurrent presentation of the same token.
            return Err(self.reuse_detected(record.user_id, now).await);
        }

        Ok(pair)
    }

    async fn reuse_detected(&self, user_id: UserId, now: DateTime<Utc>) -> AuthError {
        match self
            .refresh_tokens
            .revoke_all_refresh_tokens(user_id, now)
            .await
        {
            Ok(revoked) => {
                log::warn!(
                    "Refresh token reuse detected: user_id={} revoked={}",
                    user_id,
                    revoked
                );
                AuthError::ReuseDetected { user_id }
            }
            Err(e) => {
                log::error!(
                    "Refresh token reuse detected but revocation failed: user_id={} error={}",
                    user_id,
                    e
                );
                e
            }
        }
    }

    /// Revoke the presented refresh token. Unknown or already revoked tokens are ignored.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        if let Some(record) = self
            .refresh_tokens
            .find_refresh_token(&hash_token(refresh_token))
            .await?
        {
            self.refresh_tokens
                .revoke_refresh_token(record.id, Utc::now())
                .await?;
        }
        Ok(())
    }

    /// Revoke every outstanding refresh token of `user_id`, returning how many were revoked
    pub async fn logout_all(&self, user_id: UserId) -> AuthResult<u64> {
        self.refresh_tokens
            .revoke_all_refresh_tokens(user_id, Utc::now())
            .await
    }
}
