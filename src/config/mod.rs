//! Typed configuration from environment variables.
//!
//! Loads once at worker startup and fails fast on missing or malformed
//! values. The store URL may carry credentials, so it stays wrapped in
//! `secrecy::SecretString` and is only exposed when connecting.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};
use crate::lock::StoreKind;
use crate::model::TimeLimits;

/// Namespace used when `LOCK_NAMESPACE` is unset.
pub const DEFAULT_NAMESPACE: &str = "jobguard";

#[derive(Debug)]
pub struct Config {
    /// Shared lease store, e.g. `redis://cache:6379/0`.
    pub store_url: SecretString,
    /// First segment of every lease key.
    pub namespace: String,
    /// Queue-wide soft/hard time limits applied when a job declares none.
    pub global_limits: TimeLimits,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            store_url: SecretString::from(required_var("STORE_URL")?),
            namespace: std::env::var("LOCK_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string()),
            global_limits: TimeLimits {
                soft: optional_secs("TASK_SOFT_TIME_LIMIT")?,
                hard: optional_secs("TASK_TIME_LIMIT")?,
            },
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Config for a given store with everything else defaulted.
    pub fn for_store(url: impl Into<String>) -> Self {
        Self {
            store_url: SecretString::from(url.into()),
            namespace: DEFAULT_NAMESPACE.to_string(),
            global_limits: TimeLimits::default(),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }

    /// Which lock backend the store URL selects.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedBackend`] for stores without a lock backend.
    pub fn store_kind(&self) -> Result<StoreKind> {
        StoreKind::from_url(self.store_url.expose_secret())
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn optional_secs(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name} must be whole seconds, got {raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
