//! Ledger gatekeeper server.
//!
//! Serves the authentication endpoints and wraps every route group with the
//! bearer/admin gates and rate limits. State is kept in PostgreSQL when
//! `DATABASE_URL` is set and in process memory otherwise.

use std::{net::SocketAddr, sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Error};
use chrono::{Duration, Utc};
use ledger_guard::{
    auth::{AuthManager, LogResetNotifier},
    db::{Database, MemoryStore, PgStore},
    security::{MemoryCounterStore, PgCounterStore, RateLimitPolicy, RateLimiter},
};
use lg_server::{
    api::{self, AppState},
    config::{ConfigOverrides, ServerConfig},
    logging, metrics,
};
use pico_args::Arguments;
use tracing::{info, warn};

const HELP: &str = "\
Run the ledger gatekeeper server

USAGE:
  lg_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL, in-memory if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  JWT_SECRET               Access token signing secret (required, >= 32 chars)
  PASSWORD_PEPPER          Password hashing pepper (required, >= 16 chars)
  ADMIN_EMAILS             Comma-separated administrator emails
  RATE_LIMIT_<CLASS>_MAX   Budget per window for AUTH, CREATE, DESTRUCTIVE, HEAVY
  METRICS_BIND             Prometheus exporter address
  (See .env.example for all configuration options)
";

const COUNTER_PURGE_INTERVAL: StdDuration = StdDuration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = ConfigOverrides {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;
    info!("Starting ledger gatekeeper at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus exporter listening on {}", addr);
    }

    let admins = config.admin_policy();
    if admins.is_empty() {
        warn!("ADMIN_EMAILS is empty, admin routes will always answer 403");
    }

    let longest_window = RateLimitPolicy::ALL
        .iter()
        .map(|p| config.rate_limits.budget(*p).window_secs)
        .max()
        .unwrap_or(60);
    // Counters older than two of the longest windows can no longer affect a decision.
    let purge_horizon = i64::try_from(longest_window.saturating_mul(2))
        .ok()
        .and_then(Duration::try_seconds)
        .map_or(Duration::days(366), |horizon| horizon.min(Duration::days(366)));

    let state = match &config.database {
        Some(db_config) => {
            info!("Connecting to database {}", db_config.redacted_url());
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to apply schema")?;
            info!("Database connected successfully");

            let store = Arc::new(PgStore::new(db.pool().clone()));
            let auth_manager = Arc::new(AuthManager::new(
                &config.auth,
                store.clone(),
                store.clone(),
                store,
                Arc::new(LogResetNotifier),
            ));

            let counters = Arc::new(PgCounterStore::new(db.pool().clone()));
            let rate_limiter = Arc::new(RateLimiter::new(
                counters.clone(),
                config.rate_limits.clone(),
            ));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(COUNTER_PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    if let Err(e) = counters.purge_before(Utc::now() - purge_horizon).await {
                        warn!("Failed to purge rate limit counters: {}", e);
                    }
                }
            });

            AppState::new(auth_manager, admins, rate_limiter).with_database(db)
        }
        None => {
            warn!("DATABASE_URL not set, keeping all state in memory");
            let store = Arc::new(MemoryStore::new());
            let auth_manager = Arc::new(AuthManager::new(
                &config.auth,
                store.clone(),
                store.clone(),
                store,
                Arc::new(LogResetNotifier),
            ));

            let counters = Arc::new(MemoryCounterStore::new());
            let rate_limiter = Arc::new(RateLimiter::new(
                counters.clone(),
                config.rate_limits.clone(),
            ));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(COUNTER_PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    counters.purge_before(Utc::now() - purge_horizon).await;
                }
            });

            AppState::new(auth_manager, admins, rate_limiter)
        }
    }
    .with_trusted_proxy_headers(config.trust_proxy_headers);

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
