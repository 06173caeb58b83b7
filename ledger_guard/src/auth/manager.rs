//! Authentication manager implementation.

use std::sync::{Arc, OnceLock};

use super::{
    config::AuthConfig,
    errors::{AuthError, AuthResult},
    models::{
        AccessTokenClaims, AuthSession, ClientContext, LoginRequest, RegisterRequest, TokenPair,
        User, UserId,
    },
    passwords::{PasswordHasher, normalize_email, validate_password},
    reset::{LogResetNotifier, PasswordResetManager, ResetNotifier},
    sessions::SessionService,
    tokens::TokenService,
};
use crate::db::{MemoryStore, RefreshTokenStore, ResetTokenStore, UserRepository};

/// Entry point for every credential and session operation
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    sessions: SessionService,
    resets: PasswordResetManager,
    dummy_hash: Arc<OnceLock<Option<String>>>,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `config` - Secrets and token lifetimes
    /// * `users` - Credential store
    /// * `refresh_tokens` - Refresh token store
    /// * `reset_tokens` - Password reset token store
    /// * `notifier` - Delivery channel for reset tokens
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        let tokens = Arc::new(TokenService::from_config(config));
        let hasher = PasswordHasher::new(config.password_pepper.clone());

        let sessions = SessionService::new(
            tokens.clone(),
            users.clone(),
            refresh_tokens.clone(),
            config.refresh_token_ttl,
        );
        let resets = PasswordResetManager::new(
            users.clone(),
            reset_tokens,
            refresh_tokens,
            hasher.clone(),
            notifier,
            config.reset_token_ttl,
        );

        Self {
            users,
            hasher,
            tokens,
            sessions,
            resets,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Manager backed by a fresh [`MemoryStore`] and the logging reset notifier
    pub fn in_memory(config: &AuthConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            config,
            store.clone(),
            store.clone(),
            store,
            Arc::new(LogResetNotifier),
        )
    }

    /// Shared access token validator
    pub fn token_service(&self) -> Arc<TokenService> {
        self.tokens.clone()
    }

    /// Register a new user and open a session
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidInput` - Email malformed or password too weak
    /// * `AuthError::EmailTaken` - Email already exists
    pub async fn register(
        &self,
        request: RegisterRequest,
        ctx: &ClientContext,
    ) -> AuthResult<AuthSession> {
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let password_hash = self.hasher.hash(&request.password)?;
        let user = self.users.create_user(&email, &password_hash, name).await?;
        log::info!("User registered: user_id={}", user.id);

        let tokens = self.sessions.issue(&user, ctx).await?;
        Ok(AuthSession { tokens, user })
    }

    /// Login a user
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password; the two
    ///   cases are indistinguishable to the caller
    pub async fn login(
        &self,
        request: LoginRequest,
        ctx: &ClientContext,
    ) -> AuthResult<AuthSession> {
        let email = normalize_email(&request.email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(credentials) = self.users.find_by_email(&email).await? else {
            self.burn_verification(&request.password);
            return Err(AuthError::InvalidCredentials);
        };

        if let Err(e) = self
            .hasher
            .verify(&request.password, &credentials.password_hash)
        {
            log::warn!(
                "Failed login: user_id={} ip={}",
                credentials.user.id,
                ctx.ip_address.as_deref().unwrap_or("unknown")
            );
            return Err(e);
        }

        let tokens = self.sessions.issue(&credentials.user, ctx).await?;
        log::info!("User logged in: user_id={}", credentials.user.id);

        Ok(AuthSession {
            tokens,
            user: credentials.user,
        })
    }

    /// Run a verification against a throwaway hash so an unknown email costs
    /// as much as a wrong password.
    fn burn_verification(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hasher.hash("dummy-password-for-timing").ok());
        if let Some(hash) = dummy {
            let _ = self.hasher.verify(password, hash);
        }
    }

    /// Exchange a refresh token for a new pair
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Unknown, expired or revoked token
    /// * `AuthError::ReuseDetected` - Retired token presented again; all sessions revoked
    pub async fn refresh(&self, refresh_token: &str, ctx: &ClientContext) -> AuthResult<TokenPair> {
        self.sessions.rotate(refresh_token, ctx).await
    }

    /// Revoke a single refresh token (idempotent)
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        self.sessions.logout(refresh_token).await
    }

    /// Revoke every refresh token of `user_id`
    pub async fn logout_all(&self, user_id: UserId) -> AuthResult<u64> {
        let revoked = self.sessions.logout_all(user_id).await?;
        log::info!("Sessions revoked: user_id={} count={}", user_id, revoked);
        Ok(revoked)
    }

    /// Start a password reset. Always succeeds for unknown emails.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        self.resets.request_reset(email).await
    }

    /// Complete a password reset
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<UserId> {
        self.resets.redeem_reset(token, new_password).await
    }

    /// Verify an access token
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.tokens.verify_access_token(token)
    }

    /// Look up a user by ID
    pub async fn find_user(&self, user_id: UserId) -> AuthResult<Option<User>> {
        self.users.find_by_id(user_id).await
    }
}
