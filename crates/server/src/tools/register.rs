//! sw_register and sw_promote tool implementations.
//!
//! Registering installs a worker version and, when it skips waiting,
//! activates it in place of the current one.

use offline_core::lifecycle::{ActivateOutcome, RegisterOutcome};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::ShellState;

/// Parameters for the sw_register tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterParams {
    /// Version to deploy; defaults to the configured version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Output from the sw_promote tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwPromoteOutput {
    /// Absent when no version was waiting.
    pub activation: Option<ActivateOutcome>,
}

/// Implementation of the sw_register tool.
pub async fn register_impl(state: &ShellState, params: SwRegisterParams) -> Result<CallToolResult, McpError> {
    let manager = state.manager_for(params.version.as_deref())?;
    let outcome: RegisterOutcome = state.registration().register(manager).await?;
    json_result(&outcome)
}

/// Implementation of the sw_promote tool.
pub async fn promote_impl(state: &ShellState) -> Result<CallToolResult, McpError> {
    let activation = state.registration().promote_waiting().await?;
    json_result(&SwPromoteOutput { activation })
}
