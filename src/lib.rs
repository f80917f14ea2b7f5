//! RustPress Accounts Plugin
//!
//! User account and session system for RustPress providing:
//! - Registration with sanitized, validated usernames, emails and passwords
//! - Argon2id password hashing
//! - Signed, time-bounded access tokens
//! - Logout through a token revocation list and a per-account session flag
//! - Profile edits and password changes
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//! - `JWT_SECRET` - Secret key for signing tokens (min 32 chars; random per process if unset)
//! - `TOKEN_TTL` - Token lifetime in seconds (default: 1800)
//! - `MIN_PASSWORD_LENGTH` / `MAX_PASSWORD_LENGTH` - Password bounds (default: 8 / 128)
//! - `AUTH_RATE_LIMIT` / `AUTH_RATE_WINDOW` - Register/login quota per client (default: 5 per 60s)
//! - `TRUST_PROXY_HEADERS` - Key rate limits on `X-Forwarded-For` (default: false)
//! - `DATABASE_URL` - PostgreSQL connection string (binary only)
//!
//! # Usage
//!
//! ```rust,ignore
//! use rustpress_accounts::{AccountsPlugin, Plugin};
//!
//! let plugin = AccountsPlugin::new();
//! plugin.activate(db_pool).await?;
//! let app = plugin.router().await.unwrap();
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod service;
pub mod store;
pub mod token;
pub mod validation;

// Re-export commonly used types
pub use config::AccountsConfig;
pub use error::AccountError;
pub use extractors::{AuthSession, ClientInfo};
pub use handlers::AccountState;
pub use models::*;
pub use rate_limit::{FixedWindowRateLimiter, RateLimiter};
pub use service::AccountService;
pub use store::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
pub use token::TokenService;
pub use validation::{validate_and_sanitize, InputError, InputKind};

use async_trait::async_trait;
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

// ============================================
// Plugin Types
// ============================================

/// Plugin state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Inactive,
    Active,
    Error,
}

/// Plugin metadata
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Plugin lifecycle trait
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get plugin information
    fn info(&self) -> &PluginInfo;

    /// Get current plugin state
    async fn state(&self) -> PluginState;

    /// Activate the plugin
    async fn activate(&self, db: PgPool) -> Result<(), AccountError>;

    /// Deactivate the plugin
    async fn deactivate(&self) -> Result<(), AccountError>;
}

// ============================================
// Accounts Plugin Implementation
// ============================================

struct Services {
    config: Arc<AccountsConfig>,
    accounts: Arc<AccountService>,
    limiter: Arc<dyn RateLimiter>,
}

/// RustPress Accounts Plugin
pub struct AccountsPlugin {
    info: PluginInfo,
    state: RwLock<PluginState>,
    services: RwLock<Option<Services>>,
}

impl AccountsPlugin {
    /// Create a new accounts plugin instance
    pub fn new() -> Self {
        Self {
            info: PluginInfo {
                id: "rustpress-accounts".into(),
                name: "RustPress Accounts".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                description: "User accounts and sessions for RustPress".into(),
            },
            state: RwLock::new(PluginState::Inactive),
            services: RwLock::new(None),
        }
    }

    /// Build services over an arbitrary credential store
    ///
    /// `activate` calls this with the PostgreSQL store; tests and local runs
    /// can pass a [`MemoryCredentialStore`].
    pub async fn activate_with_store(
        &self,
        store: Arc<dyn CredentialStore>,
        config: AccountsConfig,
    ) -> Result<(), AccountError> {
        if let Err(e) = config.validate() {
            return Err(self.fail(e).await);
        }

        let config = Arc::new(config);
        let accounts = Arc::new(AccountService::new(store, config.clone()));
        let limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowRateLimiter::new(
            config.auth_rate_limit,
            Duration::from_secs(config.auth_rate_window),
        ));

        *self.services.write().await = Some(Services {
            config,
            accounts,
            limiter,
        });
        *self.state.write().await = PluginState::Active;
        Ok(())
    }

    /// Record a failed activation
    async fn fail(&self, err: AccountError) -> AccountError {
        tracing::error!(error = %err, "RustPress Accounts plugin failed to activate");
        *self.state.write().await = PluginState::Error;
        err
    }

    /// Get the account configuration
    pub async fn config(&self) -> Option<Arc<AccountsConfig>> {
        self.services.read().await.as_ref().map(|s| s.config.clone())
    }

    /// Get the account service
    pub async fn account_service(&self) -> Option<Arc<AccountService>> {
        self.services.read().await.as_ref().map(|s| s.accounts.clone())
    }

    /// Router with all account endpoints, available once active
    pub async fn router(&self) -> Option<Router> {
        self.services
            .read()
            .await
            .as_ref()
            .map(|s| create_routes(s.accounts.clone(), s.limiter.clone()))
    }
}

impl Default for AccountsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for AccountsPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    async fn state(&self) -> PluginState {
        *self.state.read().await
    }

    async fn activate(&self, db: PgPool) -> Result<(), AccountError> {
        tracing::info!("Activating RustPress Accounts plugin");

        let config = match AccountsConfig::from_env() {
            Ok(config) => config,
            Err(e) => return Err(self.fail(e).await),
        };

        let store = PgCredentialStore::new(db);
        if let Err(e) = store.migrate().await {
            return Err(self.fail(e.into()).await);
        }

        self.activate_with_store(Arc::new(store), config).await?;

        tracing::info!("RustPress Accounts plugin activated successfully");
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), AccountError> {
        tracing::info!("Deactivating RustPress Accounts plugin");

        *self.services.write().await = None;
        *self.state.write().await = PluginState::Inactive;

        tracing::info!("RustPress Accounts plugin deactivated");
        Ok(())
    }
}

/// Create account routes
pub fn create_routes(accounts: Arc<AccountService>, limiter: Arc<dyn RateLimiter>) -> Router {
    handlers::create_routes(accounts, limiter)
}

// ============================================
// Module Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_info() {
        let plugin = AccountsPlugin::new();
        assert_eq!(plugin.info.id, "rustpress-accounts");
        assert_eq!(plugin.info.name, "RustPress Accounts");
    }

    #[tokio::test]
    async fn test_plugin_initial_state() {
        let plugin = AccountsPlugin::new();
        assert_eq!(plugin.state().await, PluginState::Inactive);
        assert!(plugin.router().await.is_none());
    }

    #[tokio::test]
    async fn test_activate_and_deactivate() {
        let plugin = AccountsPlugin::new();
        plugin
            .activate_with_store(
                Arc::new(MemoryCredentialStore::new()),
                service::tests::test_config(),
            )
            .await
            .unwrap();
        assert_eq!(plugin.state().await, PluginState::Active);
        assert!(plugin.account_service().await.is_some());
        assert!(plugin.router().await.is_some());

        plugin.deactivate().await.unwrap();
        assert_eq!(plugin.state().await, PluginState::Inactive);
        assert!(plugin.config().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_sets_error_state() {
        let plugin = AccountsPlugin::new();
        let config = AccountsConfig {
            token_ttl: -1,
            ..AccountsConfig::default()
        };
        assert!(plugin
            .activate_with_store(Arc::new(MemoryCredentialStore::new()), config)
            .await
            .is_err());
        assert_eq!(plugin.state().await, PluginState::Error);
    }

    #[tokio::test]
    async fn test_bad_env_value_sets_error_state() {
        std::env::set_var("AUTH_RATE_WINDOW", "soon");
        // Never connects: configuration fails before the first query
        let db = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        let plugin = AccountsPlugin::new();
        let err = plugin.activate(db).await.unwrap_err();
        std::env::remove_var("AUTH_RATE_WINDOW");

        assert!(matches!(err, AccountError::Config(_)));
        assert_eq!(plugin.state().await, PluginState::Error);
    }
}
