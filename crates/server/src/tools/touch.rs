//! cache_touch tool implementation.
//!
//! Touches one gateway URL or content path and reports what the cache decided.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use edgepin_core::{PinCache, ResponseMeta, TouchOutcome};

use crate::error::ServerError;

/// Input parameters for cache_touch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheTouchParams {
    /// Gateway URL of the fetched resource, e.g. `http://127.0.0.1:8080/ipfs/<cid>/index.html`.
    pub url: String,

    /// Canonical content path reported by the gateway (`x-ipfs-path`), if known.
    #[serde(default)]
    pub ipfs_path: Option<String>,
}

/// Output structure for cache_touch tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheTouchOutput {
    pub url: String,
    #[serde(flatten)]
    pub outcome: TouchOutcome,
}

/// Implementation of the cache_touch tool.
pub async fn touch_impl(cache: &PinCache, params: CacheTouchParams) -> Result<CallToolResult, McpError> {
    let url = params.url.trim();
    if url.is_empty() {
        return Err(ServerError::InvalidInput("url cannot be empty".into()).into());
    }

    let meta = ResponseMeta { content_path: params.ipfs_path.filter(|p| !p.trim().is_empty()) };
    let outcome = cache.touch(&as_locator(url), &meta).await;
    tracing::debug!(url, ?outcome, "cache_touch");

    let output = CacheTouchOutput { url: url.to_string(), outcome };
    let json = serde_json::to_string_pretty(&output).map_err(ServerError::from)?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Accept a bare content path by hanging it off a placeholder origin.
fn as_locator(input: &str) -> String {
    if input.starts_with('/') { format!("http://localhost{input}") } else { input.to_string() }
}
