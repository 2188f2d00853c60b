//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offline-shell server. Each
//! tool returns its output as pretty-printed JSON text content.

pub mod cache;
pub mod events;
pub mod fetch;
pub mod register;
pub mod status;

use offline_core::http::{Response, ResponseType};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A response as shown to the host; the body is decoded lossily as UTF-8.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_len: usize,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        Self {
            url: response.url.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.response_type,
            headers: response.headers.clone(),
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_len: response.body.len(),
        }
    }
}

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::EncodeFailed(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Decode the JSON text content of a tool result.
#[cfg(test)]
pub(crate) fn output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
