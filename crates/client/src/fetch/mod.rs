//! HTTP fetch pipeline backing the cache lifecycle manager.
//!
//! ### Response Semantics
//! - Any status the server answers with is a response, including 4xx/5xx.
//! - Only transport failures (DNS, connect, timeout, body read) and bodies
//!   over `max_bytes` are errors.
//! - Responses whose final URL shares the application origin are `basic`;
//!   everything else is `cors`.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, resolve};

use offline_core::Error;
use offline_core::config::AppConfig;
use offline_core::http::{Fetcher, Request, Response, ResponseType};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Application origin used to classify responses.
    pub origin: ::url::Url,

    /// User agent string (default: "offline-shell/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Defaults for everything except the origin.
    pub fn new(origin: ::url::Url) -> Self {
        Self {
            origin,
            user_agent: "offline-shell/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::new(origin)
        })
    }
}

/// HTTP client that turns intercepted requests into responses.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn classify(&self, final_url: &::url::Url) -> ResponseType {
        if final_url.origin() == self.config.origin.origin() { ResponseType::Basic } else { ResponseType::Cors }
    }

    fn too_large(&self, len: usize) -> Error {
        Error::Network(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    /// Perform the request, respecting redirect and byte limits.
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("method {}: {}", request.method(), e)))?;

        let response = self
            .http
            .request(method, request.url().as_str())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", request.url(), e)))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        tracing::debug!(
            "fetched {} -> {} {} in {}ms ({} bytes)",
            request.url(),
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            url: final_url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            response_type: self.classify(&final_url),
        })
    }
}
