//! Token Service
//!
//! Issues HS256-signed access tokens and verifies them. A token is accepted
//! only when all of the following hold, checked in this order:
//!
//! 1. structure and signature are valid
//! 2. the embedded expiry is in the future
//! 3. the exact token string is not on the revocation list
//! 4. the owning account exists and has an active session
//!
//! Step 4 looks the account up by email and requires its id to match the
//! `sub` claim, so a token never follows an email address to a newer
//! account that took it over.
//!
//! The signature alone cannot express logout, so steps 3 and 4 require a
//! store lookup on every request.

use crate::error::AccountError;
use crate::models::{Account, TokenClaims};
use crate::store::CredentialStore;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

/// Token issuance and verification
pub struct TokenService {
    store: Arc<dyn CredentialStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(store: Arc<dyn CredentialStore>, secret: &str) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    fn validation(validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation
    }

    /// Issue a token for account `account_id` with `email`, valid for `ttl`
    pub fn issue(
        &self,
        account_id: i64,
        email: &str,
        ttl: Duration,
    ) -> Result<String, AccountError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: account_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Check signature and expiry without touching the store
    pub fn decode(&self, token: &str) -> Result<TokenClaims, AccountError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &Self::validation(true))?;
        // jsonwebtoken treats `exp == now` as valid; a token is dead at its expiry second
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(AccountError::TokenExpired);
        }
        Ok(data.claims)
    }

    /// Verify a token and return the account it authenticates
    pub async fn verify(&self, token: &str) -> Result<Account, AccountError> {
        let claims = self.decode(token)?;

        if self.store.find_revoked_token(token).await?.is_some() {
            tracing::debug!("Rejected revoked token");
            return Err(AccountError::TokenRevoked);
        }

        let account = self
            .store
            .find_by_email(&claims.email)
            .await?
            .filter(|account| account.id == claims.sub)
            .ok_or(AccountError::AccountInactive)?;

        if !account.session_active {
            tracing::debug!(account_id = account.id, "Rejected token for inactive session");
            return Err(AccountError::AccountInactive);
        }

        Ok(account)
    }

    /// Revoke a token and end the owning account's session
    ///
    /// Only the signature is checked, so an expired token can still be
    /// revoked. Revoking twice is a no-op.
    pub async fn revoke(&self, token: &str) -> Result<(), AccountError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &Self::validation(false))?;

        self.store
            .revoke_token(token, data.claims.sub, Utc::now())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAccount;
    use crate::store::MemoryCredentialStore;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters";

    async fn setup(session_active: bool) -> (Arc<MemoryCredentialStore>, TokenService) {
        let store = Arc::new(MemoryCredentialStore::new());
        let account = store
            .create_account(NewAccount {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        store.set_session_active(account.id, session_active).await.unwrap();

        let tokens = TokenService::new(store.clone(), SECRET);
        (store, tokens)
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let (_, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();

        let account = tokens.verify(&token).await.unwrap();
        assert_eq!(account.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let (_, tokens) = setup(true).await;
        let a = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        let b = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_garbage_is_invalid() {
        let (_, tokens) = setup(true).await;
        assert_eq!(tokens.verify("not-a-token").await.unwrap_err(), AccountError::TokenInvalid);
        assert_eq!(tokens.verify("").await.unwrap_err(), AccountError::TokenInvalid);
    }

    #[tokio::test]
    async fn test_wrong_secret_is_invalid() {
        let (store, tokens) = setup(true).await;
        let other = TokenService::new(store, "another-secret-that-is-32-characters-long");
        let token = other.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap_err(), AccountError::TokenInvalid);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (_, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::seconds(-10)).unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap_err(), AccountError::TokenExpired);
    }

    #[tokio::test]
    async fn test_expiry_checked_before_revocation() {
        let (_, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::seconds(-10)).unwrap();
        tokens.revoke(&token).await.unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap_err(), AccountError::TokenExpired);
    }

    #[tokio::test]
    async fn test_revoked_token_rejected() {
        let (store, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        tokens.revoke(&token).await.unwrap();

        // Revocation wins even if the session is re-activated afterwards
        store.set_session_active(1, true).await.unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap_err(), AccountError::TokenRevoked);
    }

    #[tokio::test]
    async fn test_revoke_twice_succeeds() {
        let (_, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        tokio_test::assert_ok!(tokens.revoke(&token).await);
        tokio_test::assert_ok!(tokens.revoke(&token).await);
    }

    #[tokio::test]
    async fn test_revoke_clears_session_flag() {
        let (store, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        tokens.revoke(&token).await.unwrap();
        assert!(!store.find_by_id(1).await.unwrap().unwrap().session_active);
    }

    #[tokio::test]
    async fn test_inactive_session_rejected() {
        let (_, tokens) = setup(false).await;
        let token = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap_err(), AccountError::AccountInactive);
    }

    #[tokio::test]
    async fn test_unknown_account_rejected() {
        let (_, tokens) = setup(true).await;
        let token = tokens.issue(99, "ghost@example.com", Duration::minutes(30)).unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap_err(), AccountError::AccountInactive);
    }

    #[tokio::test]
    async fn test_token_does_not_follow_email_to_new_owner() {
        let (store, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();

        store
            .update_profile(1, "alice", "alice2@example.com")
            .await
            .unwrap();
        let carol = store
            .create_account(NewAccount {
                username: "carol".into(),
                email: "alice@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        store.set_session_active(carol.id, true).await.unwrap();

        assert_eq!(tokens.verify(&token).await.unwrap_err(), AccountError::AccountInactive);
    }

    #[tokio::test]
    async fn test_revoke_after_email_change_clears_session_flag() {
        let (store, tokens) = setup(true).await;
        let token = tokens.issue(1, "alice@example.com", Duration::minutes(30)).unwrap();
        store
            .update_profile(1, "alice", "alice2@example.com")
            .await
            .unwrap();

        tokens.revoke(&token).await.unwrap();
        assert!(!store.find_by_id(1).await.unwrap().unwrap().session_active);
    }
}
