//! In-process credential store
//!
//! Holds everything behind a single lock so the uniqueness check and the
//! write happen together, mirroring the database's unique constraint.

use super::{CredentialStore, StoreError};
use crate::models::{Account, NewAccount, RevokedToken};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: i64,
    accounts: HashMap<i64, Account>,
    ids_by_email: HashMap<String, i64>,
    revoked: HashMap<String, DateTime<Utc>>,
}

/// Credential store kept in memory
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.ids_by_email.contains_key(&account.email) {
            return Err(StoreError::UniqueViolation);
        }

        inner.next_id += 1;
        let now = Utc::now();
        let created = Account {
            id: inner.next_id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            session_active: false,
            created_at: now,
            updated_at: now,
        };

        inner.ids_by_email.insert(created.email.clone(), created.id);
        inner.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .ids_by_email
            .get(email)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn update_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(owner) = inner.ids_by_email.get(email) {
            if *owner != id {
                return Err(StoreError::UniqueViolation);
            }
        }

        let Some(account) = inner.accounts.get_mut(&id) else {
            return Ok(None);
        };

        let old_email = std::mem::replace(&mut account.email, email.to_string());
        account.username = username.to_string();
        account.updated_at = Utc::now();
        let updated = account.clone();

        inner.ids_by_email.remove(&old_email);
        inner.ids_by_email.insert(updated.email.clone(), id);
        Ok(Some(updated))
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(account) = inner.accounts.get_mut(&id) {
            account.password_hash = password_hash.to_string();
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_session_active(&self, id: i64, active: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(account) = inner.accounts.get_mut(&id) {
            account.session_active = active;
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn revoke_token(
        &self,
        token: &str,
        account_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        inner.revoked.entry(token.to_string()).or_insert(revoked_at);

        if let Some(account) = inner.accounts.get_mut(&account_id) {
            account.session_active = false;
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_revoked_token(&self, token: &str) -> Result<Option<RevokedToken>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .revoked
            .get(token)
            .map(|revoked_at| RevokedToken {
                token: token.to_string(),
                revoked_at: *revoked_at,
            }))
    }
}
