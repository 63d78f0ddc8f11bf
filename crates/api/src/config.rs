//! Service configuration loaded from the environment

use std::str::FromStr;
use std::time::Duration;

use optiverifi_shared::BackendConfig;
use thiserror::Error;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_TOKEN_COOKIE: &str = "cd-token";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAYMENT_SYNC_DELAY_MS: u64 = 2000;
const DEFAULT_GUARD_TTL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Marketplace backend base URL
    pub api_url: String,
    pub bind_address: String,
    /// Cookie holding the session's bearer token
    pub token_cookie: String,
    pub http_timeout: Duration,
    /// Wait before syncing a managed-service payment so the webhook can land
    pub payment_sync_delay: Duration,
    /// How long a finished reconciliation swallows repeated return markers
    pub reconcile_guard_ttl: Duration,
    /// Empty means same-origin only
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            token_cookie: DEFAULT_TOKEN_COOKIE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            payment_sync_delay: Duration::from_millis(DEFAULT_PAYMENT_SYNC_DELAY_MS),
            reconcile_guard_ttl: Duration::from_secs(DEFAULT_GUARD_TTL_SECS),
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token_cookie = string_var("TOKEN_COOKIE", DEFAULT_TOKEN_COOKIE);
        if token_cookie.trim().is_empty() {
            return Err(ConfigError::Empty {
                name: "TOKEN_COOKIE",
            });
        }

        Ok(Self {
            api_url: string_var("API_URL", DEFAULT_API_URL),
            bind_address: string_var("BIND_ADDR", DEFAULT_BIND_ADDRESS),
            token_cookie,
            http_timeout: Duration::from_secs(number_var(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            payment_sync_delay: Duration::from_millis(number_var(
                "PAYMENT_SYNC_DELAY_MS",
                DEFAULT_PAYMENT_SYNC_DELAY_MS,
            )?),
            reconcile_guard_ttl: Duration::from_secs(number_var(
                "RECONCILE_GUARD_TTL_SECS",
                DEFAULT_GUARD_TTL_SECS,
            )?),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        })
    }

    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.api_url.clone(),
            timeout: self.http_timeout,
        }
    }
}

fn string_var(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn number_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { name, value })
        }
        _ => Ok(default),
    }
}
