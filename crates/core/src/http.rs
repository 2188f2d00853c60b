//! Request and response values exchanged between the manager, the cache, and
//! the network.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// An intercepted (or precache) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: Url,
}

impl Request {
    /// Build a request; the method is upper-cased and the fragment dropped.
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Classification of a response, mirroring what a browser reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Basic,
    Cors,
    Opaque,
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(ResponseType::Basic),
            "cors" => Some(ResponseType::Cors),
            "opaque" => Some(ResponseType::Opaque),
            "error" => Some(ResponseType::Error),
            _ => None,
        }
    }
}

/// A response as produced by the network or read back from a namespace.
///
/// The body is reference-counted, so `clone()` yields the independent
/// duplicate that gets written to the cache while the original goes back to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub response_type: ResponseType,
}

impl Response {
    /// True for any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Network-first responses are only kept when they are a plain 200 and
    /// not an error-type response.
    pub fn is_runtime_cacheable(&self) -> bool {
        self.status == 200 && self.response_type != ResponseType::Error
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Network access used by the lifecycle manager.
///
/// Implementations must only return `Err` when no response was produced at
/// all; HTTP error statuses are ordinary responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
