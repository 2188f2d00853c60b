//! The cache lifecycle manager: one instance per deployed worker version.
//!
//! The manager owns its two namespace names and reacts to host events:
//! install, activate, fetch, message, sync, push, and notification click.
//! Fetches are handled concurrently; the only shared mutable state is the
//! lifecycle state and the skip-waiting flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use super::events::{ClientAction, ControlMessage, MessageOutcome, Notification, SYNC_TAG, SyncOutcome};
use super::state::{LifecycleEvent, WorkerState};
use crate::Error;
use crate::cache::CacheDb;
use crate::config::{AppConfig, NotificationConfig};
use crate::http::{Fetcher, Request, Response};
use crate::routing::{RoutingDecision, RoutingPolicy};

/// Result of a successful install.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallOutcome {
    pub cache_name: String,
    pub precached: usize,
    pub skip_waiting: bool,
}

/// Result of an activation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateOutcome {
    /// Namespaces removed because they belonged to no current name.
    pub deleted: Vec<String>,
    pub clients_claimed: bool,
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// The network failed and the cached root document was served instead.
    RootFallback,
}

/// Result of intercepting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself.
    PassThrough,
    Responded { decision: RoutingDecision, source: ResponseSource, response: Response },
}

/// Cache lifecycle manager for one worker version.
pub struct CacheLifecycleManager {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    policy: RoutingPolicy,
    origin: Url,
    precache_name: String,
    runtime_name: String,
    precache_urls: Vec<String>,
    notification: NotificationConfig,
    skip_waiting_on_install: bool,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl std::fmt::Debug for CacheLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLifecycleManager")
            .field("precache_name", &self.precache_name)
            .field("runtime_name", &self.runtime_name)
            .finish_non_exhaustive()
    }
}

impl CacheLifecycleManager {
    /// Create a manager in the `Installing` state.
    pub fn new(config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            db,
            fetcher,
            policy: RoutingPolicy::new(&origin, &config.trusted_hosts),
            origin,
            precache_name: config.precache_name(),
            runtime_name: config.runtime_name(),
            precache_urls: config.precache_urls.clone(),
            notification: config.notification.clone(),
            skip_waiting_on_install: config.skip_waiting_on_install,
            state: RwLock::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
        })
    }

    pub fn precache_name(&self) -> &str {
        &self.precache_name
    }

    pub fn runtime_name(&self) -> &str {
        &self.runtime_name
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether the worker asked to skip the waiting period.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    async fn apply(&self, event: LifecycleEvent) -> Result<WorkerState, Error> {
        let mut state = self.state.write().await;
        let from = *state;
        let next = from.transition(event)?;
        tracing::debug!(cache = %self.precache_name, %from, to = %next, "worker state change");
        *state = next;
        Ok(next)
    }

    async fn require(&self, expected: WorkerState, event: &'static str) -> Result<(), Error> {
        let state = self.state().await;
        if state == expected { Ok(()) } else { Err(Error::InvalidState { event, state }) }
    }

    fn root_request(&self) -> Request {
        Request::get(self.origin.join("/").unwrap_or_else(|_| self.origin.clone()))
    }

    fn precache_requests(&self) -> Result<Vec<Request>, Error> {
        self.precache_urls
            .iter()
            .map(|entry| {
                self.origin
                    .join(entry)
                    .map(Request::get)
                    .map_err(|e| Error::InstallFailed { url: entry.clone(), reason: e.to_string() })
            })
            .collect()
    }

    async fn fetch_for_precache(&self, request: Request) -> Result<(Request, Response), Error> {
        let url = request.url().to_string();
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed { url: url.clone(), reason: e.to_string() })?;

        if !response.is_ok() {
            return Err(Error::InstallFailed { url, reason: format!("status {}", response.status) });
        }

        Ok((request, response))
    }

    async fn precache(&self) -> Result<usize, Error> {
        let namespace = self.db.open_namespace(&self.precache_name).await?;
        let requests = self.precache_requests()?;
        let pairs = try_join_all(requests.into_iter().map(|r| self.fetch_for_precache(r))).await?;
        namespace.put_all(&pairs).await?;
        Ok(pairs.len())
    }

    /// Fetch and store every precache resource.
    ///
    /// All-or-nothing: if a single resource fails, nothing is stored and the
    /// worker is terminated. On success the worker asks to skip waiting unless
    /// `skip_waiting_on_install` is off.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        self.require(WorkerState::Installing, "install").await?;
        tracing::info!(cache = %self.precache_name, "pre-caching offline resources");

        match self.precache().await {
            Ok(precached) => {
                self.apply(LifecycleEvent::InstallSucceeded).await?;
                if self.skip_waiting_on_install {
                    self.skip_waiting.store(true, Ordering::SeqCst);
                }
                let skip_waiting = self.skip_waiting_requested();
                tracing::info!(cache = %self.precache_name, precached, skip_waiting, "install complete");
                Ok(InstallOutcome { cache_name: self.precache_name.clone(), precached, skip_waiting })
            }
            Err(e) => {
                tracing::warn!(cache = %self.precache_name, error = %e, "install failed");
                self.apply(LifecycleEvent::InstallFailed).await?;
                Err(e)
            }
        }
    }

    async fn purge_stale(&self) -> Result<Vec<String>, Error> {
        let current = [self.precache_name.as_str(), self.runtime_name.as_str()];
        let stale: Vec<String> = self
            .db
            .namespace_names()
            .await?
            .into_iter()
            .filter(|name| !current.contains(&name.as_str()))
            .collect();

        for name in &stale {
            self.db.delete_namespace(name).await?;
            tracing::info!(cache = %name, "deleted stale cache");
        }

        Ok(stale)
    }

    /// Delete every namespace that is not current, then claim clients.
    ///
    /// Enumeration or deletion failures are returned to the host; the worker
    /// still ends up activated but does not claim clients.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        self.apply(LifecycleEvent::Activate).await?;

        let purged = self.purge_stale().await;
        self.apply(LifecycleEvent::ActivationFinished).await?;

        let deleted = purged.inspect_err(|e| tracing::error!(error = %e, "failed to purge stale caches"))?;
        tracing::info!(cache = %self.precache_name, deleted = deleted.len(), "activated and claimed clients");

        Ok(ActivateOutcome { deleted, clients_claimed: true })
    }

    /// Retire this version.
    pub async fn terminate(&self) {
        if let Err(e) = self.apply(LifecycleEvent::Terminate).await {
            tracing::debug!(error = %e, "terminate ignored");
        }
    }

    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.db.match_any(request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn store_runtime(&self, request: &Request, response: Response) {
        let result = match self.db.open_namespace(&self.runtime_name).await {
            Ok(runtime) => runtime.put(request, &response).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(url = %request.url(), error = %e, "failed to store runtime cache entry");
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let decision = RoutingDecision::CacheFirst;
        if let Some(response) = self.lookup(request).await {
            tracing::debug!(url = %request.url(), "cache hit");
            return Ok(FetchOutcome::Responded { decision, source: ResponseSource::Cache, response });
        }

        let response = self.fetcher.fetch(request).await?;
        self.store_runtime(request, response.clone()).await;
        Ok(FetchOutcome::Responded { decision, source: ResponseSource::Network, response })
    }

    async fn network_first(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let decision = RoutingDecision::NetworkFirst;
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_runtime_cacheable() {
                    self.store_runtime(request, response.clone()).await;
                }
                Ok(FetchOutcome::Responded { decision, source: ResponseSource::Network, response })
            }
            Err(network_err) => {
                tracing::debug!(url = %request.url(), error = %network_err, "network failed, falling back to cache");
                if let Some(response) = self.lookup(request).await {
                    return Ok(FetchOutcome::Responded { decision, source: ResponseSource::Cache, response });
                }
                if let Some(response) = self.lookup(&self.root_request()).await {
                    return Ok(FetchOutcome::Responded { decision, source: ResponseSource::RootFallback, response });
                }
                Err(network_err)
            }
        }
    }

    /// Intercept a request.
    ///
    /// A worker that is not activated never intercepts.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if !self.state().await.can_intercept() {
            return Ok(FetchOutcome::PassThrough);
        }

        match self.policy.route(request) {
            RoutingDecision::PassThrough => Ok(FetchOutcome::PassThrough),
            RoutingDecision::CacheFirst => self.cache_first(request).await,
            RoutingDecision::NetworkFirst => self.network_first(request).await,
        }
    }

    /// Handle a control-channel message.
    pub fn handle_message(&self, message: &serde_json::Value) -> MessageOutcome {
        match ControlMessage::parse(message) {
            Some(ControlMessage::SkipWaiting) => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                MessageOutcome::SkipWaiting
            }
            None => MessageOutcome::Ignored,
        }
    }

    /// Handle a background-sync event.
    ///
    /// The `sync-data` tag is recognised, but synchronization itself has no
    /// implementation; the event completes after logging.
    pub fn handle_sync(&self, tag: &str) -> SyncOutcome {
        if tag != SYNC_TAG {
            return SyncOutcome::Ignored { tag: tag.to_string() };
        }

        tracing::info!(tag, error = %Error::NotImplemented("background sync"), "background sync");
        SyncOutcome::NotImplemented { tag: tag.to_string() }
    }

    /// Build the notification for a push event.
    pub fn handle_push(&self, payload: Option<&str>) -> Notification {
        Notification::from_push(&self.notification, payload, chrono::Utc::now().timestamp_millis())
    }

    /// Close the clicked notification and bring up the root document.
    pub fn handle_notification_click(&self, open_clients: &[Url]) -> ClientAction {
        ClientAction::for_target(self.root_request().url(), open_clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{FakeNetwork, serve_default_precache};
    use bytes::Bytes;

    const ORIGIN: &str = "http://localhost:8000";

    async fn setup(config: AppConfig) -> (CacheDb, Arc<FakeNetwork>, CacheLifecycleManager) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let net = Arc::new(FakeNetwork::new());
        serve_default_precache(&net);
        let manager = CacheLifecycleManager::new(&config, db.clone(), net.clone()).unwrap();
        (db, net, manager)
    }

    async fn activated() -> (CacheDb, Arc<FakeNetwork>, CacheLifecycleManager) {
        let (db, net, manager) = setup(AppConfig::default()).await;
        manager.install().await.unwrap();
        manager.activate().await.unwrap();
        (db, net, manager)
    }

    fn get(path: &str) -> Request {
        Request::get(Url::parse(ORIGIN).unwrap().join(path).unwrap())
    }

    fn body_of(outcome: &FetchOutcome) -> &[u8] {
        match outcome {
            FetchOutcome::Responded { response, .. } => &response.body,
            FetchOutcome::PassThrough => panic!("expected a response"),
        }
    }

    fn source_of(outcome: &FetchOutcome) -> ResponseSource {
        match outcome {
            FetchOutcome::Responded { source, .. } => *source,
            FetchOutcome::PassThrough => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_install_precaches_every_resource() {
        let (db, net, manager) = setup(AppConfig::default()).await;

        let outcome = manager.install().await.unwrap();
        assert_eq!(outcome.cache_name, "personal-trainer-v1");
        assert_eq!(outcome.precached, 6);
        assert!(outcome.skip_waiting);
        assert_eq!(manager.state().await, WorkerState::Installed);
        assert!(manager.skip_waiting_requested());

        let precache = db.open_namespace("personal-trainer-v1").await.unwrap();
        for url in net.calls() {
            let request = Request::get(Url::parse(&url).unwrap());
            let fetched = net.fetch(&request).await.unwrap();
            let stored = precache.match_request(&request).await.unwrap().unwrap();
            assert_eq!(stored.body, fetched.body, "{url}");
        }
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let (db, net, manager) = setup(AppConfig::default()).await;
        net.serve("http://localhost:8000/static/js/sales.js", 404, "not found");

        let result = manager.install().await;
        assert!(matches!(result, Err(Error::InstallFailed { ref url, .. }) if url.ends_with("sales.js")));
        assert_eq!(manager.state().await, WorkerState::Terminated);
        assert!(!manager.skip_waiting_requested());

        let precache = db.open_namespace("personal-trainer-v1").await.unwrap();
        assert!(precache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_fails_on_network_error() {
        let (_db, net, manager) = setup(AppConfig::default()).await;
        net.set_offline(true);

        assert!(matches!(manager.install().await, Err(Error::InstallFailed { .. })));
        assert!(matches!(manager.activate().await, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_install_twice_rejected() {
        let (_db, _net, manager) = setup(AppConfig::default()).await;
        manager.install().await.unwrap();
        assert!(matches!(manager.install().await, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_activate_purges_stale_namespaces() {
        let (db, _net, manager) = setup(AppConfig::default()).await;
        db.open_namespace("personal-trainer-v0").await.unwrap();
        db.open_namespace("personal-trainer-runtime").await.unwrap();
        db.open_namespace("legacy-cache").await.unwrap();

        manager.install().await.unwrap();
        let outcome = manager.activate().await.unwrap();

        assert_eq!(outcome.deleted, vec!["personal-trainer-v0", "legacy-cache"]);
        assert!(outcome.clients_claimed);
        assert_eq!(manager.state().await, WorkerState::Activated);

        let mut names = db.namespace_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["personal-trainer-runtime", "personal-trainer-v1"]);
    }

    #[tokio::test]
    async fn test_not_activated_passes_through() {
        let (_db, net, manager) = setup(AppConfig::default()).await;
        manager.install().await.unwrap();
        let calls_before = net.calls().len();

        let outcome = manager.handle_fetch(&get("/static/css/sales.css")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::PassThrough);
        assert_eq!(net.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let (db, net, manager) = activated().await;
        let request = get("/static/img/hero.png");
        let runtime = db.open_namespace("personal-trainer-runtime").await.unwrap();
        let cached = Response {
            url: request.url().to_string(),
            status: 200,
            status_text: "OK".into(),
            headers: Vec::new(),
            body: Bytes::from_static(b"cached-png"),
            response_type: crate::http::ResponseType::Basic,
        };
        runtime.put(&request, &cached).await.unwrap();

        let outcome = manager.handle_fetch(&request).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Responded {
            decision: RoutingDecision::CacheFirst,
            source: ResponseSource::Cache,
            response: cached,
        });
        assert_eq!(net.calls_to("http://localhost:8000/static/img/hero.png"), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_once_and_stores() {
        let (db, net, manager) = activated().await;
        let url = "http://localhost:8000/static/js/dashboard.js";
        net.serve(url, 200, "dashboard()");
        let request = get("/static/js/dashboard.js");

        let outcome = manager.handle_fetch(&request).await.unwrap();
        assert_eq!(source_of(&outcome), ResponseSource::Network);
        assert_eq!(body_of(&outcome), b"dashboard()");
        assert_eq!(net.calls_to(url), 1);

        let runtime = db.open_namespace("personal-trainer-runtime").await.unwrap();
        let stored = runtime.match_request(&request).await.unwrap().unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"dashboard()"));

        let again = manager.handle_fetch(&request).await.unwrap();
        assert_eq!(source_of(&again), ResponseSource::Cache);
        assert_eq!(net.calls_to(url), 1);
    }

    #[tokio::test]
    async fn test_cache_first_precached_asset() {
        let (_db, net, manager) = activated().await;
        let before = net.calls_to("http://localhost:8000/static/css/sales.css");

        let outcome = manager.handle_fetch(&get("/static/css/sales.css")).await.unwrap();
        assert_eq!(source_of(&outcome), ResponseSource::Cache);
        assert_eq!(net.calls_to("http://localhost:8000/static/css/sales.css"), before);
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_propagates() {
        let (_db, net, manager) = activated().await;
        net.set_offline(true);

        let result = manager.handle_fetch(&get("/static/img/missing.gif")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_first_returns_live_and_stores_200() {
        let (db, net, manager) = activated().await;
        net.serve("http://localhost:8000/dashboard/", 200, "live dashboard");
        let request = get("/dashboard/");

        let outcome = manager.handle_fetch(&request).await.unwrap();
        assert_eq!(source_of(&outcome), ResponseSource::Network);
        assert_eq!(body_of(&outcome), b"live dashboard");

        let runtime = db.open_namespace("personal-trainer-runtime").await.unwrap();
        assert!(runtime.match_request(&request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_network_first_does_not_store_non_200() {
        let (db, net, manager) = activated().await;
        net.serve("http://localhost:8000/agendamento/novo/", 404, "not found");
        let request = get("/agendamento/novo/");

        let outcome = manager.handle_fetch(&request).await.unwrap();
        match outcome {
            FetchOutcome::Responded { ref response, source, .. } => {
                assert_eq!(response.status, 404);
                assert_eq!(source, ResponseSource::Network);
            }
            FetchOutcome::PassThrough => panic!("expected a response"),
        }

        let runtime = db.open_namespace("personal-trainer-runtime").await.unwrap();
        assert!(runtime.match_request(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_offline_serves_exact_copy() {
        let (_db, net, manager) = activated().await;
        net.serve("http://localhost:8000/dashboard/", 200, "dashboard v1");
        let request = get("/dashboard/");
        manager.handle_fetch(&request).await.unwrap();

        net.set_offline(true);
        let outcome = manager.handle_fetch(&request).await.unwrap();
        assert_eq!(source_of(&outcome), ResponseSource::Cache);
        assert_eq!(body_of(&outcome), b"dashboard v1");
    }

    #[tokio::test]
    async fn test_network_first_offline_falls_back_to_root() {
        let (_db, net, manager) = activated().await;
        net.set_offline(true);

        let outcome = manager.handle_fetch(&get("/produtos/")).await.unwrap();
        assert_eq!(source_of(&outcome), ResponseSource::RootFallback);
        assert_eq!(body_of(&outcome), b"<html>home</html>");
    }

    #[tokio::test]
    async fn test_network_first_offline_without_root_errors() {
        let config = AppConfig { precache_urls: vec!["/static/css/sales.css".into()], ..Default::default() };
        let (_db, net, manager) = setup(config).await;
        manager.install().await.unwrap();
        manager.activate().await.unwrap();
        net.set_offline(true);

        let result = manager.handle_fetch(&get("/produtos/")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_non_get_and_foreign_pass_through() {
        let (_db, _net, manager) = activated().await;

        let post = Request::new("POST", Url::parse("http://localhost:8000/checkout/").unwrap());
        assert_eq!(manager.handle_fetch(&post).await.unwrap(), FetchOutcome::PassThrough);

        let foreign = Request::get(Url::parse("https://www.mercadopago.com.br/checkout").unwrap());
        assert_eq!(manager.handle_fetch(&foreign).await.unwrap(), FetchOutcome::PassThrough);
    }

    #[tokio::test]
    async fn test_handle_message() {
        let (_db, _net, manager) = setup(AppConfig::default()).await;
        assert_eq!(manager.handle_message(&serde_json::json!({ "action": "reload" })), MessageOutcome::Ignored);
        assert!(!manager.skip_waiting_requested());

        assert_eq!(
            manager.handle_message(&serde_json::json!({ "action": "skipWaiting" })),
            MessageOutcome::SkipWaiting
        );
        assert!(manager.skip_waiting_requested());
    }

    #[tokio::test]
    async fn test_handle_sync() {
        let (_db, _net, manager) = setup(AppConfig::default()).await;
        assert_eq!(manager.handle_sync("sync-data"), SyncOutcome::NotImplemented { tag: "sync-data".into() });
        assert_eq!(manager.handle_sync("outbox"), SyncOutcome::Ignored { tag: "outbox".into() });
    }

    #[tokio::test]
    async fn test_handle_push_and_click() {
        let (_db, _net, manager) = setup(AppConfig::default()).await;

        let notification = manager.handle_push(Some("Seu treino começa em 1h"));
        assert_eq!(notification.title, "Personal Trainer");
        assert_eq!(notification.body, "Seu treino começa em 1h");
        assert!(notification.data.date_of_arrival > 0);

        let action = manager.handle_notification_click(&[]);
        assert_eq!(action, ClientAction::OpenWindow { url: "http://localhost:8000/".into() });
    }
}
