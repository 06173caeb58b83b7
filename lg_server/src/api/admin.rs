//! Administrator endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use ledger_guard::auth::{AuthenticatedUser, UserId};

use super::{AppState, auth::RevokedResponse, errors::ApiError};

/// Revoke every refresh token of `user_id`
pub async fn revoke_user_sessions(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(user_id): Path<UserId>,
) -> Result<Json<RevokedResponse>, ApiError> {
    let revoked = state.auth_manager.logout_all(user_id).await?;
    tracing::info!(
        admin_id = admin.user_id,
        user_id = user_id,
        revoked = revoked,
        "Administrator revoked user sessions"
    );
    Ok(Json(RevokedResponse { revoked }))
}
