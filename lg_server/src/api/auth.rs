//! Authentication API handlers.
//!
//! This module provides the HTTP endpoints for:
//! - Registration and login, both returning a fresh token pair
//! - Refresh token rotation
//! - Logout of one session or of every session
//! - Password reset request and redemption
//!
//! All bodies are JSON with camelCase field names.
//!
//! # Examples
//!
//! Register a new user:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "owner@example.com", "password": "Pass1234", "name": "Owner"}'
//! ```
//!
//! Refresh:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/refresh \
//!   -H "Content-Type: application/json" \
//!   -d '{"refreshToken": "9f2c..."}'
//! ```

use axum::{Extension, Json, extract::State};
use ledger_guard::auth::{
    AuthError, AuthSession, AuthenticatedUser, LoginRequest, RegisterRequest, TokenPair,
};
use serde::{Deserialize, Serialize};

use super::{AppState, client::ClientInfo, errors::ApiError, json::ApiJson};
use crate::{logging::{SecurityEvent, log_security_event}, metrics};

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordPayload {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: u64,
}

/// Register a new account and open a session.
///
/// # Response
///
/// `200 OK` with `{accessToken, refreshToken, expiresIn, user}`.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed email or weak password
/// - `409 Conflict`: Email already registered
pub async fn register(
    State(state): State<AppState>,
    ClientInfo(ctx): ClientInfo,
    ApiJson(payload): ApiJson<RegisterPayload>,
) -> Result<Json<AuthSession>, ApiError> {
    let request = RegisterRequest {
        email: payload.email,
        password: payload.password,
        name: payload.name,
    };

    let session = state.auth_manager.register(request, &ctx).await?;
    Ok(Json(session))
}

/// Authenticate and open a session.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    ClientInfo(ctx): ClientInfo,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<Json<AuthSession>, ApiError> {
    let request = LoginRequest {
        email: payload.email,
        password: payload.password,
    };

    match state.auth_manager.login(request, &ctx).await {
        Ok(session) => {
            metrics::login_attempts_total(true);
            Ok(Json(session))
        }
        Err(e) => {
            metrics::login_attempts_total(false);
            if matches!(e, AuthError::InvalidCredentials) {
                log_security_event(
                    SecurityEvent::FailedLogin,
                    None,
                    ctx.ip_address.as_deref(),
                    "Invalid credentials",
                );
            }
            Err(e.into())
        }
    }
}

/// Exchange a refresh token for a new pair. The presented token is retired.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown, expired, revoked or reused token. Reuse also
///   revokes every session of the token's owner.
pub async fn refresh_token(
    State(state): State<AppState>,
    ClientInfo(ctx): ClientInfo,
    ApiJson(payload): ApiJson<RefreshPayload>,
) -> Result<Json<TokenPair>, ApiError> {
    match state.auth_manager.refresh(&payload.refresh_token, &ctx).await {
        Ok(pair) => {
            metrics::token_refresh_total("success");
            Ok(Json(pair))
        }
        Err(e) => {
            if let AuthError::ReuseDetected { user_id } = e {
                metrics::token_refresh_total("reuse");
                metrics::refresh_reuse_detected_total();
                log_security_event(
                    SecurityEvent::RefreshTokenReuse,
                    Some(user_id),
                    ctx.ip_address.as_deref(),
                    "Retired refresh token presented, all sessions revoked",
                );
            } else {
                metrics::token_refresh_total("rejected");
            }
            Err(e.into())
        }
    }
}

/// Revoke the presented refresh token. Always `200 OK` unless storage fails.
pub async fn logout(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth_manager.logout(&payload.refresh_token).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Revoke every refresh token of the authenticated user.
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<RevokedResponse>, ApiError> {
    let revoked = state.auth_manager.logout_all(user.user_id).await?;
    Ok(Json(RevokedResponse { revoked }))
}

/// Start a password reset. The response never reveals whether the email is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth_manager
        .request_password_reset(&payload.email)
        .await?;
    Ok(Json(MessageResponse {
        message: "If the email is registered, a reset link has been sent".to_string(),
    }))
}

/// Redeem a reset token and set a new password.
///
/// # Errors
///
/// - `400 Bad Request`: Weak password, or an unknown/expired/used token
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth_manager
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}

/// Identity carried by the presented access token.
pub async fn me(Extension(user): Extension<AuthenticatedUser>) -> Json<AuthenticatedUser> {
    Json(user)
}
