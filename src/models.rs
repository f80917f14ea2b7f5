//! Account Models
//!
//! Data structures for account requests, responses, and stored entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// ============================================
// Stored Entities
// ============================================

/// Account entity from the credential store
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub session_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A token string invalidated by logout
#[derive(Debug, Clone, FromRow)]
pub struct RevokedToken {
    pub token: String,
    pub revoked_at: DateTime<Utc>,
}

// ============================================
// Request DTOs
// ============================================

/// Registration request
///
/// Raw fields are capped at 256 characters before sanitization runs.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(max = 256, message = "Username is too long"))]
    pub username: String,

    #[validate(length(max = 256, message = "Email is too long"))]
    pub email: String,

    #[validate(length(max = 256, message = "Password is too long"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(max = 256, message = "Email is too long"))]
    pub email: String,

    #[validate(length(max = 256, message = "Password is too long"))]
    pub password: String,
}

/// Profile edit request; absent or blank fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EditProfileRequest {
    #[serde(default)]
    #[validate(length(max = 256, message = "Username is too long"))]
    pub username: Option<String>,

    #[serde(default)]
    #[validate(length(max = 256, message = "Email is too long"))]
    pub email: Option<String>,
}

/// Change password request (for authenticated accounts)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(max = 256, message = "Password is too long"))]
    pub current_password: String,

    #[validate(length(max = 256, message = "Password is too long"))]
    pub new_password: String,
}

// ============================================
// Response DTOs
// ============================================

/// Public account data; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
        }
    }
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
        }
    }
}

/// Registration response
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub msg: String,
}

/// Login response with the issued token
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: AccountView,
}

/// Authenticated account response
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: AccountView,
}

/// Bare success response
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

// ============================================
// JWT Claims
// ============================================

/// Claims embedded in an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject account id
    pub sub: i64,
    /// Subject email
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Token ID, keeps tokens issued in the same second distinct
    pub jti: Uuid,
}
