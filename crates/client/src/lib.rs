//! Client code for offline-shell.
//!
//! This crate provides the network side of the cache lifecycle manager: a
//! reqwest-backed [`offline_core::Fetcher`] and URL resolution against the
//! application origin.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, resolve};
