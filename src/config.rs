//! Account Service Configuration
//!
//! Loaded once from environment variables at startup and shared immutably
//! afterwards. When `JWT_SECRET` is absent a random secret is generated for
//! the lifetime of the process, so tokens stop verifying after a restart.

use crate::error::AccountError;
use crate::validation::{InputValidator, DEFAULT_MAX_PASSWORD_LENGTH, DEFAULT_MIN_PASSWORD_LENGTH};

use argon2::Params;
use rand::{distributions::Alphanumeric, Rng};
use std::env;
use std::str::FromStr;

const GENERATED_SECRET_LENGTH: usize = 64;

/// Account service configuration
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// HMAC secret for signing tokens (from JWT_SECRET env var)
    pub jwt_secret: String,

    /// Whether `jwt_secret` was generated at startup rather than configured
    pub secret_generated: bool,

    /// Token lifetime in seconds (from TOKEN_TTL env var)
    pub token_ttl: i64,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Minimum password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,

    /// Maximum password length (from MAX_PASSWORD_LENGTH env var)
    pub max_password_length: usize,

    /// Requests allowed per window on register/login (from AUTH_RATE_LIMIT env var)
    pub auth_rate_limit: u32,

    /// Rate limit window in seconds (from AUTH_RATE_WINDOW env var)
    pub auth_rate_window: u64,

    /// Key rate limits on `X-Forwarded-For`/`X-Real-IP` instead of the peer
    /// address (from TRUST_PROXY_HEADERS env var). Only safe behind a proxy
    /// that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            jwt_secret: generate_secret(),
            secret_generated: true,
            token_ttl: 1800, // 30 minutes
            argon2_memory_cost: 65536, // 64 MiB
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            max_password_length: DEFAULT_MAX_PASSWORD_LENGTH,
            auth_rate_limit: 5,
            auth_rate_window: 60,
            trust_proxy_headers: false,
        }
    }
}

impl AccountsConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AccountError> {
        let defaults = Self::default();

        let (jwt_secret, secret_generated) = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => (secret, false),
            _ => {
                tracing::warn!(
                    "JWT_SECRET not set, generated a random secret; tokens will not survive a restart"
                );
                (defaults.jwt_secret, true)
            }
        };

        Ok(Self {
            jwt_secret,
            secret_generated,
            token_ttl: parse_var("TOKEN_TTL", defaults.token_ttl)?,
            argon2_memory_cost: parse_var("ARGON2_MEMORY_COST", defaults.argon2_memory_cost)?,
            argon2_time_cost: parse_var("ARGON2_TIME_COST", defaults.argon2_time_cost)?,
            argon2_parallelism: parse_var("ARGON2_PARALLELISM", defaults.argon2_parallelism)?,
            min_password_length: parse_var("MIN_PASSWORD_LENGTH", defaults.min_password_length)?,
            max_password_length: parse_var("MAX_PASSWORD_LENGTH", defaults.max_password_length)?,
            auth_rate_limit: parse_var("AUTH_RATE_LIMIT", defaults.auth_rate_limit)?,
            auth_rate_window: parse_var("AUTH_RATE_WINDOW", defaults.auth_rate_window)?,
            trust_proxy_headers: parse_var("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers)?,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AccountError> {
        if !self.secret_generated && self.jwt_secret.len() < 32 {
            return Err(AccountError::Config(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.token_ttl <= 0 {
            return Err(AccountError::Config("TOKEN_TTL must be positive".to_string()));
        }

        if self.min_password_length == 0 {
            return Err(AccountError::Config(
                "MIN_PASSWORD_LENGTH must be at least 1".to_string(),
            ));
        }

        if self.max_password_length < self.min_password_length {
            return Err(AccountError::Config(
                "MAX_PASSWORD_LENGTH must not be below MIN_PASSWORD_LENGTH".to_string(),
            ));
        }

        if self.auth_rate_limit == 0 || self.auth_rate_window == 0 {
            return Err(AccountError::Config(
                "AUTH_RATE_LIMIT and AUTH_RATE_WINDOW must be positive".to_string(),
            ));
        }

        self.argon2_params()?;

        Ok(())
    }

    /// Argon2 parameters built from the configured costs
    pub fn argon2_params(&self) -> Result<Params, AccountError> {
        Params::new(
            self.argon2_memory_cost,
            self.argon2_time_cost,
            self.argon2_parallelism,
            None,
        )
        .map_err(|e| AccountError::Config(format!("invalid Argon2 parameters: {}", e)))
    }

    /// Input validator carrying this configuration's password policy
    pub fn input_validator(&self) -> InputValidator {
        InputValidator::new(self.min_password_length, self.max_password_length)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AccountError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AccountError::Config(format!("{} has an invalid value", name))),
        Err(_) => Ok(default),
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LENGTH)
        .map(char::from)
        .collect()
}
