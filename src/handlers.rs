//! Account HTTP Handlers
//!
//! JSON endpoints under `/api/users`. Every response carries a `success`
//! flag; failures are rendered by [`AccountError`].

use crate::error::AccountError;
use crate::extractors::AuthSession;
use crate::middleware;
use crate::models::*;
use crate::rate_limit::RateLimiter;
use crate::service::AccountService;

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

/// Shared account service state
pub type AccountState = Arc<AccountService>;

// ============================================
// Route Builder
// ============================================

/// Create account routes
pub fn create_routes(accounts: AccountState, limiter: Arc<dyn RateLimiter>) -> Router {
    let rate_limit = middleware::RateLimitState {
        limiter,
        trust_proxy_headers: accounts.config().trust_proxy_headers,
    };

    // Credential endpoints, rate limited per client
    let public = Router::new()
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            middleware::rate_limit,
        ));

    // Protected routes (require a verified token)
    let protected = Router::new()
        .route("/api/users/edit", post(edit_profile))
        .route("/api/users/logout", post(logout))
        .route("/api/users/me", get(me))
        .route("/api/users/password", post(change_password))
        .layer(axum_middleware::from_fn_with_state(
            accounts.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(accounts)
}

/// Unwrap a JSON body, turning framework rejections into `{"success": false}` responses
fn json_body<T: Validate>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AccountError> {
    let Json(req) = payload.map_err(|e| AccountError::Validation(e.body_text()))?;
    req.validate()?;
    Ok(req)
}

// ============================================
// Registration
// ============================================

/// POST /api/users/register
pub async fn register(
    State(accounts): State<AccountState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AccountError> {
    let req = json_body(payload)?;
    let account = accounts.register(req).await?;

    Ok(Json(RegisterResponse {
        success: true,
        user_id: account.id,
        msg: "The user was successfully registered".to_string(),
    }))
}

// ============================================
// Login / Logout
// ============================================

/// POST /api/users/login
pub async fn login(
    State(accounts): State<AccountState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AccountError> {
    let req = json_body(payload)?;
    let response = accounts.login(req).await?;

    Ok(Json(response))
}

/// POST /api/users/logout
pub async fn logout(
    State(accounts): State<AccountState>,
    session: AuthSession,
) -> Result<impl IntoResponse, AccountError> {
    accounts.logout(&session.account, &session.token).await?;

    Ok(Json(SuccessResponse::ok()))
}

// ============================================
// Profile
// ============================================

/// POST /api/users/edit
pub async fn edit_profile(
    State(accounts): State<AccountState>,
    session: AuthSession,
    payload: Result<Json<EditProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AccountError> {
    let req = json_body(payload)?;
    accounts
        .edit_profile(&session.account, &session.token, req)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/users/me
pub async fn me(
    State(accounts): State<AccountState>,
    session: AuthSession,
) -> Result<impl IntoResponse, AccountError> {
    Ok(Json(MeResponse {
        success: true,
        user: accounts.me(&session.account),
    }))
}

/// POST /api/users/password
pub async fn change_password(
    State(accounts): State<AccountState>,
    session: AuthSession,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AccountError> {
    let req = json_body(payload)?;
    accounts.change_password(&session.account, req).await?;

    Ok(Json(SuccessResponse::ok()))
}
