//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::*};

use edgepin_core::PinCache;

use crate::error::ServerError;

/// Implementation of the cache_stats tool.
pub async fn stats_impl(cache: &PinCache) -> Result<CallToolResult, McpError> {
    let stats = cache.stats().await;
    let json = serde_json::to_string_pretty(&stats).map_err(ServerError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
