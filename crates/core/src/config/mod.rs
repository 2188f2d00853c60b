//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFLINE_SHELL_*)
//! 2. TOML config file (if OFFLINE_SHELL_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Suffix of the unversioned runtime namespace.
pub const RUNTIME_SUFFIX: &str = "runtime";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFLINE_SHELL_*)
/// 2. TOML config file (if OFFLINE_SHELL_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via OFFLINE_SHELL_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Product name, the prefix of both cache namespace names.
    #[serde(default = "default_product")]
    pub product: String,

    /// Version identifier baked into the precache namespace name.
    ///
    /// Changing it is the only way to invalidate every cache on redeploy.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin of the application the worker is registered for.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Registration scope path.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Path the worker script is registered from.
    #[serde(default = "default_script_path")]
    pub script_path: String,

    /// Resources fetched and stored at install time, in order.
    ///
    /// Relative entries resolve against `origin`.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// External hosts whose requests are intercepted alongside same-origin ones.
    #[serde(default = "default_trusted_hosts")]
    pub trusted_hosts: Vec<String>,

    /// Activate a freshly installed version without waiting for open pages
    /// to close.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Fixed parts of push notifications.
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Fixed presentation of push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_title")]
    pub title: String,

    /// Body used when the push carries no payload.
    #[serde(default = "default_notification_body")]
    pub default_body: String,

    #[serde(default = "default_notification_icon")]
    pub icon: String,

    #[serde(default = "default_notification_badge")]
    pub badge: String,

    /// Vibration pattern in milliseconds.
    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offline-shell-cache.sqlite")
}

fn default_product() -> String {
    "personal-trainer".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_scope() -> String {
    "/".into()
}

fn default_script_path() -> String {
    "/static/service-worker.js".into()
}

fn default_precache_urls() -> Vec<String> {
    vec![
        "/".into(),
        "/static/css/sales.css".into(),
        "/static/js/sales.js".into(),
        "/static/manifest.json".into(),
        "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700;800&display=swap".into(),
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css".into(),
    ]
}

fn default_trusted_hosts() -> Vec<String> {
    vec!["fonts.googleapis.com".into(), "cdnjs.cloudflare.com".into()]
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "offline-shell/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_notification_title() -> String {
    "Personal Trainer".into()
}

fn default_notification_body() -> String {
    "Nova notificação".into()
}

fn default_notification_icon() -> String {
    "/static/icons/icon-192x192.png".into()
}

fn default_notification_badge() -> String {
    "/static/icons/icon-72x72.png".into()
}

fn default_vibrate() -> Vec<u32> {
    vec![200, 100, 200]
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
            default_body: default_notification_body(),
            icon: default_notification_icon(),
            badge: default_notification_badge(),
            vibrate: default_vibrate(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            product: default_product(),
            version: default_version(),
            origin: default_origin(),
            scope: default_scope(),
            script_path: default_script_path(),
            precache_urls: default_precache_urls(),
            trusted_hosts: default_trusted_hosts(),
            skip_waiting_on_install: true,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            notification: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the versioned precache namespace, e.g. `personal-trainer-v1`.
    pub fn precache_name(&self) -> String {
        format!("{}-{}", self.product, self.version)
    }

    /// Name of the runtime namespace, e.g. `personal-trainer-runtime`.
    pub fn runtime_name(&self) -> String {
        format!("{}-{RUNTIME_SUFFIX}", self.product)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL with a host".into() }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFLINE_SHELL_`
    /// 2. TOML file from `OFFLINE_SHELL_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFLINE_SHELL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFLINE_SHELL_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./offline-shell-cache.sqlite"));
        assert_eq!(config.product, "personal-trainer");
        assert_eq!(config.version, "v1");
        assert_eq!(config.precache_urls.len(), 6);
        assert_eq!(config.precache_urls[0], "/");
        assert_eq!(config.trusted_hosts, vec!["fonts.googleapis.com", "cdnjs.cloudflare.com"]);
        assert_eq!(config.notification.vibrate, vec![200, 100, 200]);
        assert!(config.skip_waiting_on_install);
    }

    #[test]
    fn test_namespace_names() {
        let config = AppConfig::default();
        assert_eq!(config.precache_name(), "personal-trainer-v1");
        assert_eq!(config.runtime_name(), "personal-trainer-runtime");

        let config = AppConfig { version: "v2".into(), ..Default::default() };
        assert_eq!(config.precache_name(), "personal-trainer-v2");
        assert_eq!(config.runtime_name(), "personal-trainer-runtime");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:8000/");

        let config = AppConfig { origin: "file:///srv/app".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_load_layers_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "offline.toml",
                r#"
                version = "v7"
                origin = "https://trainer.example"

                [notification]
                title = "Trainer"
                "#,
            )?;
            jail.set_env("OFFLINE_SHELL_CONFIG_FILE", "offline.toml");
            jail.set_env("OFFLINE_SHELL_PRODUCT", "coach");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.precache_name(), "coach-v7");
            assert_eq!(config.origin, "https://trainer.example");
            assert_eq!(config.notification.title, "Trainer");
            assert_eq!(config.notification.default_body, "Nova notificação");
            Ok(())
        });
    }
}
