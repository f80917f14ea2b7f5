//! Request Extractors
//!
//! Axum extractors for the authenticated session and client metadata.

use crate::error::AccountError;
use crate::models::Account;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use std::net::SocketAddr;

/// Header carrying the raw token; no `Bearer ` prefix is expected
pub const TOKEN_HEADER: &str = "authorization";

/// Account and token verified by [`crate::middleware::require_auth`]
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account: Account,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AccountError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only the auth gate inserts a session, so a handler reached without
        // it behaves as if no token was sent
        parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .ok_or(AccountError::MissingToken)
    }
}

/// Read the raw token from request headers
pub fn token_from_parts(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Client address used to key rate limits
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: Option<String>,
}

impl ClientInfo {
    /// Resolve the client address from request parts
    ///
    /// The peer address is authoritative. `X-Forwarded-For` and `X-Real-IP`
    /// are client-controlled and only consulted when `trust_proxy_headers`
    /// is set.
    pub fn from_parts(parts: &Parts, trust_proxy_headers: bool) -> Self {
        let forwarded = if trust_proxy_headers {
            parts
                .headers
                .get("X-Forwarded-For")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    parts
                        .headers
                        .get("X-Real-IP")
                        .and_then(|h| h.to_str().ok())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                })
        } else {
            None
        };

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        ClientInfo { ip }
    }

    /// Key used by the rate limiter
    pub fn rate_limit_key(&self) -> String {
        self.ip.clone().unwrap_or_else(|| "unknown".to_string())
    }
}
