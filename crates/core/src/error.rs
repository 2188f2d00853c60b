//! Unified error types for offline-shell.
//!
//! Every variant carries a stable code prefix so host-side diagnostics can be
//! matched without parsing free-form text.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::lifecycle::WorkerState;

/// Unified error types for the cache lifecycle manager.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., malformed control message).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A precache resource could not be fetched; the install was aborted.
    #[error("INSTALL_FAILED: {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// The network request itself failed (no response was produced).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Lifecycle event arrived in a state that cannot accept it.
    #[error("INVALID_STATE: cannot {event} while {state}")]
    InvalidState { event: &'static str, state: WorkerState },

    /// No worker has been installed for the registration yet.
    #[error("NOT_INSTALLED")]
    NotInstalled,

    /// Capability is declared but has no implementation.
    #[error("NOT_IMPLEMENTED: {0}")]
    NotImplemented(&'static str),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) | Error::InvalidUrl(_) => -32602,
            Error::InstallFailed { .. } => -32020,
            Error::Network(_) => -32021,
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => -32002,
            Error::InvalidState { .. } => -32022,
            Error::NotInstalled => -32023,
            Error::NotImplemented(_) => -32024,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
