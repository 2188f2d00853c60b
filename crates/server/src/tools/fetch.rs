//! sw_fetch tool implementation.
//!
//! Dispatches a request through the active worker exactly as an intercepted
//! page request would be, and reports where the response came from.

use offline_core::http::Request;
use offline_core::lifecycle::{FetchOutcome, ResponseSource};
use offline_core::routing::RoutingDecision;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ResponseView, json_result};
use crate::error::ToolError;
use crate::state::ShellState;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Request target; relative targets resolve against the application origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// URL of the page issuing the request, if any.
    #[serde(default)]
    pub client_url: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwFetchOutput {
    /// The worker did not intercept; the host fetches normally.
    PassThrough { url: String },
    Responded { decision: RoutingDecision, source: ResponseSource, response: ResponseView },
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(state: &ShellState, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let method = params.method.trim();
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidInput(format!("invalid method: {:?}", params.method)).into());
    }

    let url = state.resolve(&params.url)?;
    let client = params
        .client_url
        .as_deref()
        .map(|page| state.resolve(page))
        .transpose()?;

    let request = Request::new(method, url);
    let output = match state.registration().fetch(&request, client.as_ref()).await? {
        FetchOutcome::PassThrough => SwFetchOutput::PassThrough { url: request.url().to_string() },
        FetchOutcome::Responded { decision, source, response } => {
            SwFetchOutput::Responded { decision, source, response: ResponseView::from(&response) }
        }
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::shell;
    use crate::tools::output;
    use crate::tools::register::{SwRegisterParams, register_impl};

    fn get(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: default_method(), client_url: None }
    }

    #[tokio::test]
    async fn test_fetch_before_register_passes_through() {
        let (state, _) = shell().await;
        let result: SwFetchOutput = output(&fetch_impl(&state, get("/dashboard/")).await.unwrap());
        assert!(matches!(result, SwFetchOutput::PassThrough { url } if url == "http://localhost:8000/dashboard/"));
    }

    #[tokio::test]
    async fn test_static_asset_served_from_precache() {
        let (state, net) = shell().await;
        register_impl(&state, SwRegisterParams::default()).await.unwrap();
        net.set_offline(true);

        let result: SwFetchOutput = output(&fetch_impl(&state, get("/static/css/sales.css")).await.unwrap());
        match result {
            SwFetchOutput::Responded { decision, source, response } => {
                assert_eq!(decision, RoutingDecision::CacheFirst);
                assert_eq!(source, ResponseSource::Cache);
                assert_eq!(response.body, "precached");
            }
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_offline_document_falls_back_to_root() {
        let (state, net) = shell().await;
        register_impl(&state, SwRegisterParams::default()).await.unwrap();
        net.set_offline(true);

        let result: SwFetchOutput = output(&fetch_impl(&state, get("/agenda/")).await.unwrap());
        match result {
            SwFetchOutput::Responded { decision, source, .. } => {
                assert_eq!(decision, RoutingDecision::NetworkFirst);
                assert_eq!(source, ResponseSource::RootFallback);
            }
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let (state, _) = shell().await;
        register_impl(&state, SwRegisterParams::default()).await.unwrap();

        let params = SwFetchParams { method: "post".into(), ..get("/api/agenda") };
        let result: SwFetchOutput = output(&fetch_impl(&state, params).await.unwrap());
        assert!(matches!(result, SwFetchOutput::PassThrough { .. }));
    }

    #[tokio::test]
    async fn test_uncontrolled_client_passes_through() {
        let (state, _) = shell().await;
        register_impl(&state, SwRegisterParams::default()).await.unwrap();

        let params = SwFetchParams { client_url: Some("http://other.example/".into()), ..get("/") };
        let result: SwFetchOutput = output(&fetch_impl(&state, params).await.unwrap());
        assert!(matches!(result, SwFetchOutput::PassThrough { .. }));
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let (state, _) = shell().await;
        let params = SwFetchParams { method: "GE T".into(), ..get("/") };
        let err = fetch_impl(&state, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
