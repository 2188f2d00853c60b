//! sw_status tool implementation.

use offline_core::lifecycle::RegistrationStatus;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::ShellState;

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    pub registration: RegistrationStatus,
    /// Every namespace in storage, oldest first.
    pub namespaces: Vec<String>,
}

pub async fn status_impl(state: &ShellState) -> Result<CallToolResult, McpError> {
    let registration = state.registration().status().await;
    let namespaces = state.db().namespace_names().await?;
    json_result(&SwStatusOutput { registration, namespaces })
}
