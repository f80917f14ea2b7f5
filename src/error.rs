//! Account Error Types
//!
//! Centralized error handling for all account and session operations.
//! Every variant renders as a `{"success": false, ...}` body; internal
//! details are logged, never returned.

use crate::store::StoreError;
use crate::validation::InputError;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Account and session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    InvalidInput(#[from] InputError),

    #[error("{0}")]
    Validation(String),

    #[error("Email already taken")]
    DuplicateEmail,

    #[error("Wrong credentials")]
    InvalidCredentials,

    #[error("Valid JWT token is missing")]
    MissingToken,

    #[error("Token is invalid")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Session is not active")]
    AccountInactive,

    #[error("Too many requests. Please try again later")]
    RateLimited { retry_after: u64 },

    #[error("Storage error: {0}")]
    StorageFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl AccountError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::InvalidInput(_) | AccountError::Validation(_) => "invalid_input",
            AccountError::DuplicateEmail => "duplicate_email",
            AccountError::InvalidCredentials => "invalid_credentials",
            AccountError::MissingToken => "missing_token",
            AccountError::TokenInvalid => "token_invalid",
            AccountError::TokenExpired => "token_expired",
            AccountError::TokenRevoked => "token_revoked",
            AccountError::AccountInactive => "account_inactive",
            AccountError::RateLimited { .. } => "rate_limited",
            AccountError::StorageFailure(_) | AccountError::Config(_) | AccountError::Internal => {
                "internal_error"
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AccountError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AccountError::StorageFailure(_) | AccountError::Config(_) | AccountError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the caller
    pub fn public_message(&self) -> String {
        match self {
            AccountError::StorageFailure(_) | AccountError::Config(_) | AccountError::Internal => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.code(),
            "msg": self.public_message(),
        }));

        match self {
            AccountError::RateLimited { retry_after } => (
                self.status(),
                [(header::RETRY_AFTER, retry_after.to_string())],
                body,
            )
                .into_response(),
            _ => (self.status(), body).into_response(),
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation => AccountError::DuplicateEmail,
            StoreError::Unavailable(detail) => {
                tracing::error!("Credential store error: {}", detail);
                AccountError::StorageFailure(detail)
            }
        }
    }
}

impl From<argon2::password_hash::Error> for AccountError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AccountError::Internal
    }
}

impl From<jsonwebtoken::errors::Error> for AccountError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        tracing::debug!("JWT error: {:?}", err);
        match err.kind() {
            ErrorKind::ExpiredSignature => AccountError::TokenExpired,
            _ => AccountError::TokenInvalid,
        }
    }
}

impl From<validator::ValidationErrors> for AccountError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .next()
            .unwrap_or_else(|| errors.to_string());
        AccountError::Validation(message)
    }
}
