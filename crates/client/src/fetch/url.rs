//! URL resolution against the application origin.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for offline_core::Error {
    fn from(err: UrlError) -> Self {
        offline_core::Error::InvalidUrl(err.to_string())
    }
}

/// Resolve a request target the way a page would.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative and scheme-relative input against `base`
/// 3. Only http and https are accepted
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(input: &str, base: &Url) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    resolved.set_fragment(None);

    Ok(resolved)
}
