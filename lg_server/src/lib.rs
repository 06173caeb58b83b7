//! HTTP gatekeeper for the ledger service.
//!
//! Binds the `ledger_guard` session, token and throttling core to an axum
//! router. The binary in `main.rs` only wires configuration to [`api::create_router`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
