//! In-process store backend.
//!
//! All state lives behind one `tokio::sync::Mutex`. Critical sections are
//! purely synchronous, so the lock is never held across an await point.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repository::{RefreshTokenStore, ResetTokenStore, UserRepository};
use crate::auth::{
    AuthError, AuthResult, RefreshTokenRecord, ResetTokenRecord, User, UserCredentials, UserId,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, UserCredentials>,
    users_by_email: HashMap<String, UserId>,
    next_user_id: UserId,
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
    refresh_by_hash: HashMap<String, Uuid>,
    reset_tokens: HashMap<Uuid, ResetTokenRecord>,
    reset_by_hash: HashMap<String, Uuid>,
}

impl MemoryState {
    fn ensure_unique(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        if self.refresh_by_hash.contains_key(&record.token_hash)
            || self.refresh_tokens.contains_key(&record.id)
        {
            return Err(AuthError::Storage(format!(
                "duplicate refresh token record {}",
                record.id
            )));
        }
        Ok(())
    }

    fn insert_refresh(&mut self, record: &RefreshTokenRecord) -> AuthResult<()> {
        self.ensure_unique(record)?;
        self.refresh_by_hash
            .insert(record.token_hash.clone(), record.id);
        self.refresh_tokens.insert(record.id, record.clone());
        Ok(())
    }
}

/// Memory-backed implementation of every repository trait
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All refresh token records of a user, oldest first
    pub async fn refresh_tokens_for_user(&self, user_id: UserId) -> Vec<RefreshTokenRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state
            .refresh_tokens
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.issued_at);
        records
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> AuthResult<User> {
        let mut state = self.state.lock().await;
        if state.users_by_email.contains_key(email) {
            return Err(AuthError::EmailTaken);
        }

        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            email: email.to_string(),
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };

        state.users_by_email.insert(user.email.clone(), user.id);
        state.users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserCredentials>> {
        let state = self.state.lock().await;
        Ok(state
            .users_by_email
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).map(|c| c.user.clone()))
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        self.state.lock().await.insert_refresh(record)
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .refresh_by_hash
            .get(token_hash)
            .and_then(|id| state.refresh_tokens.get(id))
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        state.ensure_unique(replacement)?;

        match state.refresh_tokens.get_mut(&old_id) {
            Some(old) if !old.revoked => {
                old.revoked = true;
                old.revoked_at = Some(now);
            }
            _ => return Ok(false),
        }

        state.insert_refresh(replacement)?;
        Ok(true)
    }

    async fn revoke_refresh_token(&self, id: Uuid, now: DateTime<Utc>) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        match state.refresh_tokens.get_mut(&id) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                record.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_refresh_tokens(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let mut revoked = 0;
        for record in state
            .refresh_tokens
            .values_mut()
            .filter(|r| r.user_id == user_id && !r.revoked)
        {
            record.revoked = true;
            record.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[async_trait]
impl ResetTokenStore for MemoryStore {
    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state
            .reset_by_hash
            .insert(record.token_hash.clone(), record.id);
        state.reset_tokens.insert(record.id, record.clone());
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(id) = state.reset_by_hash.get(token_hash).copied() else {
            return Ok(None);
        };
        let Some(record) = state.reset_tokens.get_mut(&id) else {
            return Ok(None);
        };
        if record.used || record.expires_at <= now {
            return Ok(None);
        }

        let Some(credentials) = state.users.get_mut(&record.user_id) else {
            return Ok(None);
        };

        record.used = true;
        credentials.password_hash = new_password_hash.to_string();
        Ok(Some(record.user_id))
    }
}
