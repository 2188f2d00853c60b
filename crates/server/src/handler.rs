//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes tool calls to the
//! appropriate implementations. Each tool corresponds to one event the host
//! dispatches to the worker, or to a read-only cache inspection.
use std::sync::Arc;

use crate::state::ShellState;
use crate::tools::{
    cache::{CacheKeysParams, CacheMatchParams, keys_impl, match_impl},
    events::{
        SwMessageParams, SwNotificationClickParams, SwPushParams, SwSyncParams, message_impl,
        notification_click_impl, push_impl, sync_impl,
    },
    fetch::{SwFetchParams, fetch_impl},
    register::{SwRegisterParams, promote_impl, register_impl},
    status::status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for offline-shell.
#[derive(Clone)]
pub struct OfflineShellServer {
    tool_router: ToolRouter<Self>,
    state: Arc<ShellState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OfflineShellServer {
    /// Create a new server handler.
    pub fn new(state: Arc<ShellState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    #[tool(
        description = "Register a worker version: precache its resources and activate it unless it must wait. Defaults to the configured version."
    )]
    async fn sw_register(&self, params: Parameters<SwRegisterParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.state, params.0).await
    }

    #[tool(description = "Activate the waiting worker version, as when every controlled page has closed.")]
    async fn sw_promote(&self) -> Result<CallToolResult, McpError> {
        promote_impl(&self.state).await
    }

    /// Intercept a request through the active worker.
    ///
    /// Reports the routing decision and whether the response came from cache,
    /// the network, or the offline root fallback.
    #[tool(
        description = "Fetch a URL through the active worker. Returns pass_through or the response with its routing decision and source."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Post a message to the worker. {\"action\": \"skipWaiting\"} activates a waiting version.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.state, params.0).await
    }

    #[tool(description = "Deliver a background sync event with the given tag.")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.state, params.0).await
    }

    #[tool(description = "Deliver a push event. Returns the notification to display.")]
    async fn sw_push(&self, params: Parameters<SwPushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.state, params.0).await
    }

    #[tool(description = "Deliver a notification click. Returns whether to focus an open page or open a new window.")]
    async fn sw_notification_click(
        &self, params: Parameters<SwNotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.state, params.0).await
    }

    #[tool(description = "Show the registration's active and waiting versions and every cache namespace.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.state).await
    }

    #[tool(description = "List stored requests per cache namespace.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.state, params.0).await
    }

    #[tool(description = "Look up a stored response by URL in one namespace or across all of them.")]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        match_impl(&self.state, params.0).await
    }
}

impl ServerHandler for OfflineShellServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offline-shell".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
