//! HTTP API for the ledger gatekeeper.
//!
//! # Architecture
//!
//! The API is built with:
//! - **Axum**: Async web framework
//! - **Tower**: Middleware for CORS, request IDs, authentication and rate limits
//! - **JWT**: HS256 access tokens plus rotating opaque refresh tokens
//!
//! # Modules
//!
//! - [`auth`]: Registration, login, refresh, logout and password reset
//! - [`admin`]: Administrator-only session revocation
//! - [`middleware`]: Bearer and administrator gates
//! - [`rate_limit`]: Per-route-group request budgets
//! - [`request_id`]: Request correlation
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                                - Health check (public)
//! POST   /api/v1/auth/register                  - Register (auth budget)
//! POST   /api/v1/auth/login                     - Login (auth budget)
//! POST   /api/v1/auth/refresh                   - Rotate refresh token (auth budget)
//! POST   /api/v1/auth/logout                    - Revoke one refresh token (auth budget)
//! POST   /api/v1/auth/forgot-password           - Request reset (auth budget)
//! POST   /api/v1/auth/reset-password            - Redeem reset (auth budget)
//! GET    /api/v1/auth/me                        - Current identity (bearer)
//! POST   /api/v1/auth/logout-all                - Revoke all sessions (bearer, destructive budget)
//! DELETE /api/v1/admin/users/{user_id}/sessions - Revoke a user's sessions (admin, destructive budget)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use lg_server::api::{AppState, create_router};
//! use ledger_guard::{
//!     auth::{AdminPolicy, AuthConfig, AuthManager},
//!     security::{RateLimitConfig, RateLimiter},
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::new("a-signing-secret-of-at-least-32-chars", "pepper-0123456789");
//! let state = AppState::new(
//!     Arc::new(AuthManager::in_memory(&config)),
//!     AdminPolicy::single("admin@example.com"),
//!     Arc::new(RateLimiter::in_memory(RateLimitConfig::default())),
//! );
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod admin;
pub mod auth;
pub mod client;
pub mod errors;
pub mod json;
pub mod middleware;
pub mod rate_limit;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
};
use ledger_guard::{
    auth::{AccessGate, AdminPolicy, AuthManager},
    db::Database,
    security::{RateLimitPolicy, RateLimiter},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use rate_limit::apply_rate_limit;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub gate: AccessGate,
    pub rate_limiter: Arc<RateLimiter>,
    /// Take the client IP from `X-Forwarded-For`
    pub trust_proxy_headers: bool,
    /// Checked by the health endpoint when present
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(
        auth_manager: Arc<AuthManager>,
        admins: AdminPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let gate = AccessGate::new(auth_manager.token_service(), admins);
        Self {
            auth_manager,
            gate,
            rate_limiter,
            trust_proxy_headers: false,
            database: None,
        }
    }

    pub fn with_trusted_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router(&state))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: &AppState) -> Router<AppState> {
    // Public routes, counted per IP
    let public_routes = apply_rate_limit(
        Router::new()
            .route("/auth/register", post(auth::register))
            .route("/auth/login", post(auth::login))
            .route("/auth/refresh", post(auth::refresh_token))
            .route("/auth/logout", post(auth::logout))
            .route("/auth/forgot-password", post(auth::forgot_password))
            .route("/auth/reset-password", post(auth::reset_password)),
        state,
        RateLimitPolicy::Auth,
    );

    let identity_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // The auth layer is added last so it runs first and the limiter sees the identity.
    let destructive_routes = apply_rate_limit(
        Router::new().route("/auth/logout-all", post(auth::logout_all)),
        state,
        RateLimitPolicy::Destructive,
    )
    .route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::auth_middleware,
    ));

    let admin_routes = apply_rate_limit(
        Router::new().route(
            "/admin/users/{user_id}/sessions",
            delete(admin::revoke_user_sessions),
        ),
        state,
        RateLimitPolicy::Destructive,
    )
    .route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::admin_middleware,
    ));

    Router::new()
        .merge(public_routes)
        .merge(identity_routes)
        .merge(destructive_routes)
        .merge(admin_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK`, or `503 Service Unavailable` when the configured database
/// does not answer.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
