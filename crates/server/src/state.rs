//! Process-wide state shared by every tool call.

use std::sync::Arc;

use offline_client::resolve;
use offline_core::config::AppConfig;
use offline_core::{CacheDb, CacheLifecycleManager, Error, Fetcher, Registration};
use url::Url;

/// Cache database, network client, and the registration they serve.
pub struct ShellState {
    config: AppConfig,
    origin: Url,
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    registration: Registration,
}

impl ShellState {
    pub fn new(config: AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let registration = Registration::from_config(&config)?;
        Ok(Self { config, origin, db, fetcher, registration })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Build a manager for `version`, or the configured version when absent.
    pub fn manager_for(&self, version: Option<&str>) -> Result<Arc<CacheLifecycleManager>, Error> {
        let mut config = self.config.clone();
        if let Some(version) = version {
            config.version = version.trim().to_string();
        }
        config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;

        let manager = CacheLifecycleManager::new(&config, self.db.clone(), self.fetcher.clone())?;
        Ok(Arc::new(manager))
    }

    /// Resolve a page-relative target against the application origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        Ok(resolve(input, &self.origin)?)
    }
}
