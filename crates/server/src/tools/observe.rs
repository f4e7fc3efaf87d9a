//! cache_observe tool implementation.
//!
//! Forwards one completed gateway fetch through the cache's observer hook.
//! The touch runs in the background; the result only says whether the event
//! was queued and whether it qualifies for caching.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use edgepin_core::cache::path::CONTENT_PATH_HEADER;
use edgepin_core::{FetchEvent, PinCache};

use crate::error::ServerError;

/// Input parameters for cache_observe tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheObserveParams {
    /// URL of the completed request.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Response status code (default: 200).
    #[serde(default = "default_status")]
    pub status: u16,

    /// Value of the `x-ipfs-path` response header, if present.
    #[serde(default)]
    pub ipfs_path: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

fn default_status() -> u16 {
    200
}

/// Output structure for cache_observe tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheObserveOutput {
    /// The event passed the GET / status / gateway-path filter.
    pub candidate: bool,
    /// The event was queued for the observer.
    pub queued: bool,
}

/// Implementation of the cache_observe tool.
pub async fn observe_impl(cache: &PinCache, params: CacheObserveParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ServerError::InvalidInput("url cannot be empty".into()).into());
    }

    let mut event = FetchEvent { url: params.url, method: params.method, status: params.status, headers: Vec::new() };
    if let Some(path) = params.ipfs_path {
        event = event.with_header(CONTENT_PATH_HEADER, path);
    }

    let candidate = event.is_candidate();
    let queued = cache.observer().completed(event);

    let output = CacheObserveOutput { candidate, queued };
    let json = serde_json::to_string_pretty(&output).map_err(ServerError::from)?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
