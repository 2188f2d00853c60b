//! Request identity used as the key inside a cache namespace.

use sha2::{Digest, Sha256};

use crate::http::Request;

/// Compute the key for a request: SHA-256 over method and URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key for a `Request` value.
pub fn request_key(request: &Request) -> String {
    compute_request_key(request.method(), request.url().as_str())
}
