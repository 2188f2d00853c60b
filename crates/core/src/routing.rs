//! Fetch routing policy.
//!
//! Deciding how an intercepted request is served is pure: it depends only on
//! the request and the policy, never on cache or network state.
//!
//! ### Rules
//! - Non-GET requests pass through.
//! - Requests that are neither same-origin nor to a trusted host pass through.
//! - Paths ending in a static-asset extension are served cache-first.
//! - Everything else (documents, API calls) is served network-first.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::{Origin, Url};

use crate::config::AppConfig;
use crate::http::Request;
use crate::Error;

static STATIC_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(css|js|png|jpg|jpeg|gif|svg|woff|woff2|ttf|eot)$").expect("static asset pattern is valid")
});

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Serve from cache, falling back to the network on a miss.
    CacheFirst,
    /// Try the network, falling back to cache on failure.
    NetworkFirst,
    /// Not intercepted; the host performs its default behaviour.
    PassThrough,
}

/// Which requests are intercepted and how.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    origin: Origin,
    trusted_hosts: Vec<String>,
}

impl RoutingPolicy {
    pub fn new(origin: &Url, trusted_hosts: &[String]) -> Self {
        Self {
            origin: origin.origin(),
            trusted_hosts: trusted_hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(&origin, &config.trusted_hosts))
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    pub fn is_trusted_host(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.trusted_hosts.iter().any(|trusted| trusted == host))
    }

    /// Decide how `request` is served.
    pub fn route(&self, request: &Request) -> RoutingDecision {
        if !request.is_get() {
            return RoutingDecision::PassThrough;
        }

        let url = request.url();
        if !self.is_same_origin(url) && !self.is_trusted_host(url) {
            return RoutingDecision::PassThrough;
        }

        if is_static_asset(url) { RoutingDecision::CacheFirst } else { RoutingDecision::NetworkFirst }
    }
}

/// True when the URL path carries a style, script, image, or font extension.
pub fn is_static_asset(url: &Url) -> bool {
    STATIC_ASSET.is_match(url.path())
}

/// Free-function form of [`RoutingPolicy::route`].
pub fn route(request: &Request, policy: &RoutingPolicy) -> RoutingDecision {
    policy.route(request)
}
