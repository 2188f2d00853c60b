//! Tools for the non-fetch worker events: message, sync, push, and
//! notification click.

use offline_core::lifecycle::{ClientAction, MessageOutcome, Notification, SyncOutcome};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::json_result;
use crate::state::ShellState;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message posted to the worker, e.g. `{ "action": "skipWaiting" }`.
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    pub outcome: MessageOutcome,
}

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Background sync registration tag.
    pub tag: String,
}

/// Parameters for the sw_push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwPushParams {
    /// Plain-text push payload; the default body is used when absent.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Parameters for the sw_notification_click tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwNotificationClickParams {
    /// URLs of the pages currently open in the scope.
    #[serde(default)]
    pub open_clients: Vec<String>,
}

pub async fn message_impl(state: &ShellState, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let outcome = state.registration().message(&params.message).await?;
    json_result(&SwMessageOutput { outcome })
}

pub async fn sync_impl(state: &ShellState, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let outcome: SyncOutcome = state.registration().sync(params.tag.trim()).await?;
    json_result(&outcome)
}

pub async fn push_impl(state: &ShellState, params: SwPushParams) -> Result<CallToolResult, McpError> {
    let notification: Notification = state.registration().push(params.payload.as_deref()).await?;
    json_result(&notification)
}

pub async fn notification_click_impl(
    state: &ShellState, params: SwNotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let open_clients = params
        .open_clients
        .iter()
        .map(|page| state.resolve(page))
        .collect::<Result<Vec<Url>, _>>()?;

    let action: ClientAction = state.registration().notification_click(&open_clients).await?;
    json_result(&action)
}
