//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, RUNTIME_SUFFIX};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `product` or `version` is empty or contains whitespace
    /// - `version` equals the runtime suffix (the two namespaces would collide)
    /// - `origin` is not an absolute http(s) URL
    /// - `scope` or `script_path` is not an absolute path
    /// - a `precache_urls` entry cannot be resolved against `origin`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("product", &self.product), ("version", &self.version)] {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(invalid(field, "must not contain whitespace"));
            }
        }
        if self.version == RUNTIME_SUFFIX {
            return Err(invalid("version", "collides with the runtime namespace name"));
        }

        let origin = self.origin_url()?;

        if !self.scope.starts_with('/') {
            return Err(invalid("scope", "must be an absolute path"));
        }
        if !self.script_path.starts_with('/') {
            return Err(invalid("script_path", "must be an absolute path"));
        }

        for entry in &self.precache_urls {
            origin
                .join(entry)
                .map_err(|e| invalid("precache_urls", format!("{entry}: {e}")))?;
        }
        if self.precache_urls.is_empty() {
            tracing::warn!("precache_urls is empty; offline fallback to the root document will be unavailable");
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        Ok(())
    }
}
