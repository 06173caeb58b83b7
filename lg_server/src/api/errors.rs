//! JSON error bodies and the mapping from library errors to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ledger_guard::auth::AuthError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by every handler and middleware in this crate
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

/// HTTP status for an authentication error
pub fn auth_error_status(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidToken
        | AuthError::ReuseDetected { .. }
        | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::InvalidResetToken | AuthError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::Database(_)
        | AuthError::Storage(_)
        | AuthError::HashingFailed
        | AuthError::LifetimeOutOfRange(_)
        | AuthError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        if error.is_internal() {
            tracing::error!(error = %error, "Internal error while handling auth request");
        }
        Self::new(auth_error_status(&error), error.client_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
