//! Account Middleware
//!
//! The auth gate applied to every protected route, and the rate limiting
//! layer for the credential endpoints.

use crate::error::AccountError;
use crate::extractors::{token_from_parts, AuthSession, ClientInfo};
use crate::handlers::AccountState;
use crate::rate_limit::{RateDecision, RateLimiter};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// State for the [`rate_limit`] layer
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<dyn RateLimiter>,
    pub trust_proxy_headers: bool,
}

/// Verify the raw token in the `authorization` header
///
/// On success the verified [`AuthSession`] is stored in request extensions
/// for handlers to extract. Any failure ends the request before the
/// handler runs.
pub async fn require_auth(
    State(accounts): State<AccountState>,
    req: Request,
    next: Next,
) -> Result<Response, AccountError> {
    let (parts, body) = req.into_parts();
    let token = token_from_parts(&parts).ok_or(AccountError::MissingToken)?;

    let account = accounts.tokens().verify(&token).await.map_err(|e| {
        tracing::debug!(error = %e, "Token verification failed");
        e
    })?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(AuthSession { account, token });

    Ok(next.run(req).await)
}

/// Reject clients that exceeded their request quota
pub async fn rate_limit(
    State(state): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Result<Response, AccountError> {
    let (parts, body) = req.into_parts();
    let key = ClientInfo::from_parts(&parts, state.trust_proxy_headers).rate_limit_key();

    let (limit, remaining) = match state.limiter.check(&key).await {
        RateDecision::Allowed { limit, remaining } => (limit, remaining),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            return Err(AccountError::RateLimited {
                retry_after: retry_after.as_secs().max(1),
            });
        }
    };

    let mut response = next.run(Request::from_parts(parts, body)).await;

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", limit.into());
    headers.insert("x-ratelimit-remaining", remaining.into());

    Ok(response)
}
