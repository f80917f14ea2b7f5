//! PostgreSQL credential store
//!
//! Email uniqueness is enforced by the `accounts.email` unique constraint;
//! violations surface as [`StoreError::UniqueViolation`].

use super::{CredentialStore, StoreError};
use crate::models::{Account, NewAccount, RevokedToken};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Credential store backed by PostgreSQL
#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the account and revocation tables if they do not exist
    pub async fn migrate(&self) -> Result<(), StoreError> {
        tracing::info!("Running account database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(32) NOT NULL,
                email VARCHAR(64) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                session_active BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS revoked_tokens (
                token TEXT PRIMARY KEY,
                revoked_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_revoked_tokens_revoked_at ON revoked_tokens(revoked_at);",
        )
        .execute(&self.db)
        .await?;

        tracing::info!("Account migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let created = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, email, password_hash, session_active)
            VALUES ($1, $2, $3, FALSE)
            RETURNING *
            "#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .fetch_one(&self.db)
        .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(account)
    }

    async fn update_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as(
            r#"
            UPDATE accounts SET
                username = $2,
                email = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_session_active(&self, id: i64, active: bool) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE accounts SET session_active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(account_id = id, "Session flag update matched no account");
        }
        Ok(())
    }

    async fn revoke_token(
        &self,
        token: &str,
        account_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO revoked_tokens (token, revoked_at) VALUES ($1, $2) ON CONFLICT (token) DO NOTHING",
        )
        .bind(token)
        .bind(revoked_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE accounts SET session_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_revoked_token(&self, token: &str) -> Result<Option<RevokedToken>, StoreError> {
        let revoked = sqlx::query_as("SELECT token, revoked_at FROM revoked_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?;
        Ok(revoked)
    }
}
