//! Request metadata extraction.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header::USER_AGENT, request::Parts},
};
use ledger_guard::auth::ClientContext;
use std::{convert::Infallible, net::SocketAddr};

use super::AppState;

/// Header consulted for the client address behind a trusted proxy
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Placeholder when neither the socket nor a trusted header yields an address
pub const UNKNOWN_IP: &str = "unknown";

/// Resolve the client IP for a request
///
/// Behind a trusted proxy the rightmost `X-Forwarded-For` entry is used: it is
/// the one appended by the proxy itself. Entries to its left are client-supplied.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers
        && let Some(forwarded) = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

fn peer_addr(parts: &Parts) -> Option<SocketAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Extractor for the caller's user agent and IP
#[derive(Debug, Clone)]
pub struct ClientInfo(pub ClientContext);

impl FromRequestParts<AppState> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let ip = client_ip(&parts.headers, peer_addr(parts), state.trust_proxy_headers);

        Ok(ClientInfo(ClientContext {
            user_agent,
            ip_address: Some(ip),
        }))
    }
}

/// Client IP for a request seen by middleware
pub fn request_ip(request: &axum::extract::Request, trust_proxy_headers: bool) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(request.headers(), peer, trust_proxy_headers)
}
