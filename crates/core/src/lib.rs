//! Core types and shared functionality for offline-shell.
//!
//! This crate provides:
//! - Cache namespaces with a SQLite backend
//! - The worker lifecycle state machine and version registration
//! - Fetch routing policy
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod routing;

pub use cache::{CacheDb, EntrySummary, Namespace};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Fetcher, Request, Response, ResponseType};
pub use lifecycle::{CacheLifecycleManager, Registration, WorkerState};
pub use routing::{RoutingDecision, RoutingPolicy};
