//! Cache inspection tools.
//!
//! Both tools are read-only: naming a namespace that does not exist is an
//! error rather than creating it.

use offline_core::http::Request;
use offline_core::{CacheDb, EntrySummary};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ResponseView, json_result};
use crate::error::ToolError;
use crate::state::ShellState;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Namespace to list; every namespace when absent.
    #[serde(default)]
    pub cache_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceListing {
    pub cache_name: String,
    pub entries: Vec<EntrySummary>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub caches: Vec<NamespaceListing>,
}

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// Request target; relative targets resolve against the application origin.
    pub url: String,

    /// Namespace to search; all namespaces, oldest first, when absent.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub response: Option<ResponseView>,
}

async fn require_namespace(db: &CacheDb, name: &str) -> Result<(), McpError> {
    if db.has_namespace(name).await? {
        Ok(())
    } else {
        Err(ToolError::InvalidInput(format!("no cache named {name}")).into())
    }
}

pub async fn keys_impl(state: &ShellState, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let db = state.db();
    let names = match params.cache_name {
        Some(name) => {
            require_namespace(db, &name).await?;
            vec![name]
        }
        None => db.namespace_names().await?,
    };

    let mut caches = Vec::with_capacity(names.len());
    for name in names {
        let entries = db.open_namespace(&name).await?.entries().await?;
        caches.push(NamespaceListing { cache_name: name, entries });
    }

    json_result(&CacheKeysOutput { caches })
}

pub async fn match_impl(state: &ShellState, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    let db = state.db();
    let request = Request::get(state.resolve(&params.url)?);

    let response = match params.cache_name {
        Some(name) => {
            require_namespace(db, &name).await?;
            db.open_namespace(&name).await?.match_request(&request).await?
        }
        None => db.match_any(&request).await?,
    };

    json_result(&CacheMatchOutput { response: response.as_ref().map(ResponseView::from) })
}
