//! Credential Store
//!
//! Persistence boundary for accounts and the token revocation list. The
//! store is the source of truth for email uniqueness: implementations must
//! reject a duplicate email atomically and report it as
//! [`StoreError::UniqueViolation`].

pub mod memory;
pub mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

use crate::models::{Account, NewAccount, RevokedToken};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Credential store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Storage operations the account workflow depends on
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new account with `session_active = false`
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError>;

    /// Look up by normalized (lowercased) email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Overwrite username and email, returning the updated account
    async fn update_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError>;

    async fn set_session_active(&self, id: i64, active: bool) -> Result<(), StoreError>;

    /// Add `token` to the revocation list and clear the session flag of
    /// account `account_id`, in one atomic step. Revoking an already
    /// revoked token succeeds without changing its timestamp.
    async fn revoke_token(
        &self,
        token: &str,
        account_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn find_revoked_token(&self, token: &str) -> Result<Option<RevokedToken>, StoreError>;
}
