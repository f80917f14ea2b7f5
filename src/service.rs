//! Account Service
//!
//! Session and account workflow: registration, login, logout, profile
//! edits and password changes. Input is sanitized before any store access
//! and passwords are hashed with Argon2id.

use crate::config::AccountsConfig;
use crate::error::AccountError;
use crate::models::*;
use crate::store::CredentialStore;
use crate::token::TokenService;
use crate::validation::{InputError, InputKind, InputValidator};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Plaintext behind the hash checked when a login names an unknown email
const DUMMY_PASSWORD: &str = "rustpress-accounts-dummy-password";

/// Account service
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    config: Arc<AccountsConfig>,
    validator: InputValidator,
    dummy_hash: OnceCell<String>,
}

impl AccountService {
    /// Create a new account service
    pub fn new(store: Arc<dyn CredentialStore>, config: Arc<AccountsConfig>) -> Self {
        let tokens = TokenService::new(store.clone(), &config.jwt_secret);
        let validator = config.input_validator();

        Self {
            store,
            tokens,
            config,
            validator,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Get reference to the token service
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Get reference to config
    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    // ============================================
    // Password Hashing
    // ============================================

    fn argon2(&self) -> Result<Argon2<'static>, AccountError> {
        let params = self.config.argon2_params()?;

        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    /// Hash a password using Argon2id
    pub fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)?
            .to_string();
        Ok(hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AccountError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AccountError::Internal)?;
        Ok(self
            .argon2()?
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Burn the same Argon2 cost as a real check so unknown emails are not
    /// distinguishable by response time
    fn verify_dummy_password(&self, password: &str) -> Result<(), AccountError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD))?;
        self.verify_password(password, hash)?;
        Ok(())
    }

    // ============================================
    // Registration
    // ============================================

    /// Register a new account; no token is issued
    pub async fn register(&self, req: RegisterRequest) -> Result<Account, AccountError> {
        let username = self
            .validator
            .validate_and_sanitize(&req.username, InputKind::Username)?;
        let email = self
            .validator
            .validate_and_sanitize(&req.email, InputKind::Email)?;
        let password = self
            .validator
            .validate_and_sanitize(&req.password, InputKind::Password)?;

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AccountError::DuplicateEmail);
        }

        let password_hash = self.hash_password(&password)?;

        // A concurrent registration can still win the race; the store's
        // unique constraint turns that into DuplicateEmail too
        let account = self
            .store
            .create_account(NewAccount {
                username,
                email,
                password_hash,
            })
            .await?;

        tracing::info!(account_id = account.id, email = %account.email, "Account registered");

        Ok(account)
    }

    // ============================================
    // Login / Logout
    // ============================================

    /// Check credentials, issue a token and activate the session
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AccountError> {
        let email = self
            .validator
            .validate_and_sanitize(&req.email, InputKind::Email)?;
        let password = req.password.trim();
        if password.is_empty() {
            return Err(InputError::Empty(InputKind::Password).into());
        }

        // Unknown email and wrong password must be indistinguishable
        let account = match self.store.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                tracing::warn!(email = %email, "Login attempt for unknown email");
                self.verify_dummy_password(password)?;
                return Err(AccountError::InvalidCredentials);
            }
        };

        if !self.verify_password(password, &account.password_hash)? {
            tracing::warn!(account_id = account.id, "Login attempt with wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(account.id, &account.email, Duration::seconds(self.config.token_ttl))?;

        self.store.set_session_active(account.id, true).await?;

        tracing::info!(account_id = account.id, "Account logged in");

        Ok(LoginResponse {
            success: true,
            token,
            user: AccountView::from(account),
        })
    }

    /// Revoke the presented token and end the session
    pub async fn logout(&self, account: &Account, token: &str) -> Result<(), AccountError> {
        self.tokens.revoke(token).await?;

        tracing::info!(account_id = account.id, "Account logged out");
        Ok(())
    }

    // ============================================
    // Profile
    // ============================================

    /// Public view of the authenticated account
    pub fn me(&self, account: &Account) -> AccountView {
        AccountView::from(account)
    }

    /// Update username and/or email; blank fields are ignored
    ///
    /// Changing the email revokes `token` and ends the session, so the
    /// account has to log in again under its new address.
    pub async fn edit_profile(
        &self,
        account: &Account,
        token: &str,
        req: EditProfileRequest,
    ) -> Result<AccountView, AccountError> {
        let username = match non_blank(req.username) {
            Some(raw) => self
                .validator
                .validate_and_sanitize(&raw, InputKind::Username)?,
            None => account.username.clone(),
        };

        let email = match non_blank(req.email) {
            Some(raw) => {
                let email = self.validator.validate_and_sanitize(&raw, InputKind::Email)?;
                if let Some(owner) = self.store.find_by_email(&email).await? {
                    if owner.id != account.id {
                        return Err(AccountError::DuplicateEmail);
                    }
                }
                email
            }
            None => account.email.clone(),
        };

        if username == account.username && email == account.email {
            return Ok(AccountView::from(account));
        }

        let updated = self
            .store
            .update_profile(account.id, &username, &email)
            .await?
            .ok_or(AccountError::AccountInactive)?;

        if updated.email != account.email {
            self.tokens.revoke(token).await?;
            tracing::info!(account_id = updated.id, "Email changed, session ended");
        }

        tracing::info!(account_id = updated.id, "Profile updated");

        Ok(AccountView::from(updated))
    }

    // ============================================
    // Password Management
    // ============================================

    /// Change password for an authenticated account
    pub async fn change_password(
        &self,
        account: &Account,
        req: ChangePasswordRequest,
    ) -> Result<(), AccountError> {
        if !self.verify_password(req.current_password.trim(), &account.password_hash)? {
            return Err(AccountError::InvalidCredentials);
        }

        let new_password = self
            .validator
            .validate_and_sanitize(&req.new_password, InputKind::Password)?;
        let password_hash = self.hash_password(&new_password)?;

        self.store
            .set_password_hash(account.id, &password_hash)
            .await?;

        tracing::info!(account_id = account.id, "Password changed");
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    pub(crate) fn test_config() -> AccountsConfig {
        AccountsConfig {
            jwt_secret: "test-secret-that-is-at-least-32-characters".into(),
            secret_generated: false,
            argon2_memory_cost: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..AccountsConfig::default()
        }
    }

    fn service() -> (Arc<MemoryCredentialStore>, AccountService) {
        let store = Arc::new(MemoryCredentialStore::new());
        let service = AccountService::new(store.clone(), Arc::new(test_config()));
        (store, service)
    }

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let (_, service) = service();
        let hash = service.hash_password("Abc123!@").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify_password("Abc123!@", &hash).unwrap());
        assert!(!service.verify_password("Abc123!#", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_login_verify() {
        let (_, service) = service();
        let account = service
            .register(register_req("alice", "alice@example.com", "Abc123!@"))
            .await
            .unwrap();
        assert_eq!(account.id, 1);
        assert!(!account.session_active);
        assert_ne!(account.password_hash, "Abc123!@");

        let login = service
            .login(login_req("alice@example.com", "Abc123!@"))
            .await
            .unwrap();
        assert_eq!(login.user.username, "alice");

        let verified = service.tokens().verify(&login.token).await.unwrap();
        assert_eq!(verified.id, account.id);
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let (store, service) = service();
        service
            .register(register_req("alice", "  Alice@Example.com", "Abc123!@"))
            .await
            .unwrap();
        assert!(store.find_by_email("alice@example.com").await.unwrap().is_some());

        // Login with a differently-cased email finds the same account
        assert!(service
            .login(login_req("ALICE@example.com", "Abc123!@"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (_, service) = service();
        service
            .register(register_req("alice", "alice@example.com", "Abc123!@"))
            .await
            .unwrap();

        let err = service
            .register(register_req("bob", "Alice@example.com", "Xyz789#$"))
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::DuplicateEmail);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let (_, service) = service();
        let err = service
            .register(register_req("9lives", "cat@example.com", "Abc123!@"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidInput(_)));

        let err = service
            .register(register_req("cat", "cat@example.com", "password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (_, service) = service();
        service
            .register(register_req("alice", "alice@example.com", "Abc123!@"))
            .await
            .unwrap();

        let wrong_password = service
            .login(login_req("alice@example.com", "Wrong123!"))
            .await
            .unwrap_err();
        let unknown_email = service
            .login(login_req("nobody@example.com", "Abc123!@"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password, AccountError::InvalidCredentials);
        assert_eq!(unknown_email, wrong_password);
        assert_eq!(unknown_email.public_message(), wrong_password.public_message());
    }

    #[tokio::test]
    async fn test_unknown_email_still_checks_a_hash() {
        let (_, service) = service();
        assert!(service.dummy_hash.get().is_none());

        let err = service
            .login(login_req("nobody@example.com", "Abc123!@"))
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::InvalidCredentials);

        let hash = service.dummy_hash.get().expect("dummy hash initialized");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (_, service) = service();
        service
            .register(register_req("alice", "alice@example.com", "Abc123!@"))
            .await
            .unwrap();
        let login = service
            .login(login_req("alice@example.com", "Abc123!@"))
            .await
            .unwrap();

        let account = service.tokens().verify(&login.token).await.unwrap();
        service.logout(&account, &login.token).await.unwrap();

        assert_eq!(
            service.tokens().verify(&login.token).await.unwrap_err(),
            AccountError::TokenRevoked
        );
    }

    #[tokio::test]
    async fn test_relogin_after_logout() {
        let (_, service) = service();
        service
            .register(register_req("alice", "alice@example.com", "Abc123!@"))
            .await
            .unwrap();
        let first = service
            .login(login_req("alice@example.com", "Abc123!@"))
            .await
            .unwrap();
        let account = service.tokens().verify(&first.token).await.unwrap();
        service.logout(&account, &first.token).await.unwrap();

        let second = service
            .login(login_req("alice@example.com", "Abc123!@"))
            .await
            .unwrap();
        assert_ne!(first.token, second.token);
        assert!(service.tokens().verify(&second.token).await.is_ok());
        assert_eq!(
            service.tokens().verify(&first.token).await.unwrap_err(),
            AccountError::TokenRevoked
        );
    }

    async fn signed_in(
        service: &AccountService,
        username: &str,
        email: &str,
    ) -> (Account, String) {
        service
            .register(register_req(username, email, "Abc123!@"))
            .await
            .unwrap();
        let login = service.login(login_req(email, "Abc123!@")).await.unwrap();
        let account = service.tokens().verify(&login.token).await.unwrap();
        (account, login.token)
    }

    #[tokio::test]
    async fn test_edit_profile() {
        let (store, service) = service();
        let (account, token) = signed_in(&service, "alice", "alice@example.com").await;

        let view = service
            .edit_profile(
                &account,
                &token,
                EditProfileRequest {
                    username: Some("alicia".into()),
                    email: Some("Alicia@Example.com".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.username, "alicia");
        assert_eq!(view.email, "alicia@example.com");
        assert!(store.find_by_email("alice@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_change_ends_session() {
        let (store, service) = service();
        let (account, token) = signed_in(&service, "alice", "alice@example.com").await;

        service
            .edit_profile(
                &account,
                &token,
                EditProfileRequest {
                    username: None,
                    email: Some("alicia@example.com".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            service.tokens().verify(&token).await.unwrap_err(),
            AccountError::TokenRevoked
        );
        assert!(!store.find_by_id(account.id).await.unwrap().unwrap().session_active);

        // The freed address goes to someone else; the old token stays dead
        let (carol, _) = signed_in(&service, "carol", "alice@example.com").await;
        assert_ne!(carol.id, account.id);
        assert!(service.tokens().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_username_change_keeps_session() {
        let (_, service) = service();
        let (account, token) = signed_in(&service, "alice", "alice@example.com").await;

        service
            .edit_profile(
                &account,
                &token,
                EditProfileRequest {
                    username: Some("alicia".into()),
                    email: None,
                },
            )
            .await
            .unwrap();

        let verified = service.tokens().verify(&token).await.unwrap();
        assert_eq!(verified.username, "alicia");
    }

    #[tokio::test]
    async fn test_edit_profile_blank_fields_unchanged() {
        let (_, service) = service();
        let (account, token) = signed_in(&service, "alice", "alice@example.com").await;

        let view = service
            .edit_profile(
                &account,
                &token,
                EditProfileRequest {
                    username: Some("  ".into()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(view, AccountView::from(&account));
    }

    #[tokio::test]
    async fn test_edit_profile_duplicate_email_leaves_account_unchanged() {
        let (store, service) = service();
        let (alice, token) = signed_in(&service, "alice", "alice@example.com").await;
        service
            .register(register_req("bob", "bob@example.com", "Abc123!@"))
            .await
            .unwrap();

        let err = service
            .edit_profile(
                &alice,
                &token,
                EditProfileRequest {
                    username: Some("alicia".into()),
                    email: Some("bob@example.com".into()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::DuplicateEmail);

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.username, "alice");
        assert_eq!(stored.email, "alice@example.com");
        assert!(service.tokens().verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_edit_profile_keep_own_email() {
        let (_, service) = service();
        let (account, token) = signed_in(&service, "alice", "alice@example.com").await;

        let view = service
            .edit_profile(
                &account,
                &token,
                EditProfileRequest {
                    username: Some("alicia".into()),
                    email: Some("alice@example.com".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.username, "alicia");
        assert!(service.tokens().verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password() {
        let (store, service) = service();
        let account = service
            .register(register_req("alice", "alice@example.com", "Abc123!@"))
            .await
            .unwrap();

        let err = service
            .change_password(
                &account,
                ChangePasswordRequest {
                    current_password: "Wrong123!".into(),
                    new_password: "New456#$x".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::InvalidCredentials);

        service
            .change_password(
                &account,
                ChangePasswordRequest {
                    current_password: "Abc123!@".into(),
                    new_password: "New456#$x".into(),
                },
            )
            .await
            .unwrap();

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(service.verify_password("New456#$x", &stored.password_hash).unwrap());
        assert!(service
            .login(login_req("alice@example.com", "Abc123!@"))
            .await
            .is_err());
    }
}
