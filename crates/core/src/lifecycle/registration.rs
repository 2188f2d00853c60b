//! Registration: the host-side handle binding a scope to worker versions.
//!
//! A registration holds at most one active and one waiting manager. New
//! versions install alongside the active one; they only replace it once the
//! install succeeded and waiting was skipped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use super::events::{ClientAction, MessageOutcome, Notification, SyncOutcome};
use super::manager::{ActivateOutcome, CacheLifecycleManager, FetchOutcome, InstallOutcome};
use super::state::WorkerState;
use crate::Error;
use crate::config::AppConfig;
use crate::http::Request;

/// Result of registering a new worker version.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RegisterOutcome {
    pub install: InstallOutcome,
    /// Present when the new version was activated immediately.
    pub activation: Option<ActivateOutcome>,
    /// Precache namespace of the version that was replaced, if any.
    pub replaced: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerSummary {
    pub cache_name: String,
    pub state: WorkerState,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RegistrationStatus {
    pub scope: String,
    pub script_url: String,
    pub active: Option<WorkerSummary>,
    pub waiting: Option<WorkerSummary>,
}

#[derive(Default)]
struct Slots {
    active: Option<Arc<CacheLifecycleManager>>,
    waiting: Option<Arc<CacheLifecycleManager>>,
}

/// Scope-bound holder of the active and waiting worker versions.
pub struct Registration {
    scope: Url,
    script_url: Url,
    slots: Mutex<Slots>,
}

async fn summary(manager: &CacheLifecycleManager) -> WorkerSummary {
    WorkerSummary { cache_name: manager.precache_name().to_string(), state: manager.state().await }
}

impl Registration {
    pub fn new(scope: Url, script_url: Url) -> Self {
        Self { scope, script_url, slots: Mutex::new(Slots::default()) }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(origin.join(&config.scope)?, origin.join(&config.script_path)?))
    }

    /// Whether a page at `page` is controlled by this registration.
    pub fn controls(&self, page: &Url) -> bool {
        page.origin() == self.scope.origin() && page.path().starts_with(self.scope.path())
    }

    pub async fn active(&self) -> Option<Arc<CacheLifecycleManager>> {
        self.slots.lock().await.active.clone()
    }

    async fn require_active(&self) -> Result<Arc<CacheLifecycleManager>, Error> {
        self.active().await.ok_or(Error::NotInstalled)
    }

    /// Install `manager` and, if it asks to skip waiting, activate it.
    ///
    /// A failed install leaves the current active version serving. A
    /// successful install retires any older waiting version, so only the
    /// newest installed version can ever be promoted.
    ///
    /// If activation fails, `manager` has already replaced the previous
    /// active version and keeps serving; the returned error only reports the
    /// failed purge of stale namespaces.
    pub async fn register(&self, manager: Arc<CacheLifecycleManager>) -> Result<RegisterOutcome, Error> {
        let install = manager.install().await?;

        let mut slots = self.slots.lock().await;
        if let Some(previous) = slots.waiting.take() {
            tracing::info!(cache = %previous.precache_name(), "superseded waiting version");
            previous.terminate().await;
        }

        if manager.skip_waiting_requested() {
            let (activation, replaced) = Self::promote(&mut slots, manager).await?;
            return Ok(RegisterOutcome { install, activation: Some(activation), replaced });
        }

        slots.waiting = Some(manager);
        Ok(RegisterOutcome { install, activation: None, replaced: None })
    }

    async fn promote(
        slots: &mut Slots, manager: Arc<CacheLifecycleManager>,
    ) -> Result<(ActivateOutcome, Option<String>), Error> {
        if slots.waiting.as_ref().is_some_and(|w| Arc::ptr_eq(w, &manager)) {
            slots.waiting = None;
        }

        let replaced = match slots.active.replace(manager.clone()) {
            Some(previous) => {
                previous.terminate().await;
                Some(previous.precache_name().to_string())
            }
            None => None,
        };

        let activation = manager.activate().await?;
        tracing::info!(cache = %manager.precache_name(), replaced = ?replaced, "worker version activated");
        Ok((activation, replaced))
    }

    /// Activate the waiting version, if there is one.
    ///
    /// As with [`Registration::register`], an activation error leaves the
    /// promoted version active.
    pub async fn promote_waiting(&self) -> Result<Option<ActivateOutcome>, Error> {
        let mut slots = self.slots.lock().await;
        let Some(waiting) = slots.waiting.clone() else {
            return Ok(None);
        };
        let (activation, _) = Self::promote(&mut slots, waiting).await?;
        Ok(Some(activation))
    }

    /// Deliver a control message, preferring the waiting version.
    pub async fn message(&self, message: &serde_json::Value) -> Result<MessageOutcome, Error> {
        let mut slots = self.slots.lock().await;

        if let Some(waiting) = slots.waiting.clone() {
            let outcome = waiting.handle_message(message);
            if outcome == MessageOutcome::SkipWaiting {
                Self::promote(&mut slots, waiting).await?;
            }
            return Ok(outcome);
        }

        let active = slots.active.clone().ok_or(Error::NotInstalled)?;
        Ok(active.handle_message(message))
    }

    /// Route a request from `client` (if known) to the active version.
    pub async fn fetch(&self, request: &Request, client: Option<&Url>) -> Result<FetchOutcome, Error> {
        if client.is_some_and(|page| !self.controls(page)) {
            return Ok(FetchOutcome::PassThrough);
        }

        match self.active().await {
            Some(active) => active.handle_fetch(request).await,
            None => Ok(FetchOutcome::PassThrough),
        }
    }

    pub async fn sync(&self, tag: &str) -> Result<SyncOutcome, Error> {
        Ok(self.require_active().await?.handle_sync(tag))
    }

    pub async fn push(&self, payload: Option<&str>) -> Result<Notification, Error> {
        Ok(self.require_active().await?.handle_push(payload))
    }

    pub async fn notification_click(&self, open_clients: &[Url]) -> Result<ClientAction, Error> {
        Ok(self.require_active().await?.handle_notification_click(open_clients))
    }

    pub async fn status(&self) -> RegistrationStatus {
        let slots = self.slots.lock().await;
        let active = match &slots.active {
            Some(m) => Some(summary(m).await),
            None => None,
        };
        let waiting = match &slots.waiting {
            Some(m) => Some(summary(m).await),
            None => None,
        };
        RegistrationStatus { scope: self.scope.to_string(), script_url: self.script_url.to_string(), active, waiting }
    }
}
