//! SQLite-backed cache storage holding every cache namespace.
//!
//! This module provides persistent, named key-value namespaces using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request keys derived from method and URL with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Atomic multi-entry writes for precaching

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{EntrySummary, Namespace};
