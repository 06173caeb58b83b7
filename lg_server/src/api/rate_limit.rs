//! Rate limiting middleware for route groups.
//!
//! Each route group is bound to one [`RateLimitPolicy`]. Anonymous requests
//! are counted per client IP; requests that already passed the auth
//! middleware are counted per IP and user.

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use ledger_guard::{
    auth::AuthenticatedUser,
    security::{RateLimitKey, RateLimitPolicy, RateLimitResult},
};
use serde::Serialize;

use super::{AppState, client::request_ip, errors::ApiError};
use crate::{logging::{SecurityEvent, log_security_event}, metrics};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub error: String,
    pub retry_after: u64,
}

fn limited_response(message: &str, retry_after: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedResponse {
            error: message.to_string(),
            retry_after,
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

/// Count the request against `policy` and reject it with `429` once the budget is spent
pub async fn rate_limit_middleware(
    State((state, policy)): State<(AppState, RateLimitPolicy)>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = request_ip(&request, state.trust_proxy_headers);
    let user_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.user_id);
    let key = match user_id {
        Some(user_id) => RateLimitKey::authenticated(&ip, user_id),
        None => RateLimitKey::anonymous(&ip),
    };

    let result = state.rate_limiter.check(policy, &key).await.map_err(|e| {
        tracing::error!(error = %e, policy = %policy, "Rate limiter unavailable");
        ApiError::internal()
    })?;

    match result {
        RateLimitResult::Allowed { .. } => Ok(next.run(request).await),
        RateLimitResult::Limited { retry_after } => {
            metrics::rate_limit_hits_total(policy.name());
            log_security_event(
                SecurityEvent::RateLimited,
                user_id,
                Some(&ip),
                &format!("{policy} budget exhausted, retry after {retry_after}s"),
            );
            let budget = state.rate_limiter.budget(policy);
            Ok(limited_response(&budget.message, retry_after))
        }
    }
}

/// Apply the `policy` budget to every route of `router`.
///
/// Call this before layering [`auth_middleware`](super::middleware::auth_middleware)
/// so the identity is already known when the request is counted.
pub fn apply_rate_limit(
    router: Router<AppState>,
    state: &AppState,
    policy: RateLimitPolicy,
) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        (state.clone(), policy),
        rate_limit_middleware,
    ))
}
