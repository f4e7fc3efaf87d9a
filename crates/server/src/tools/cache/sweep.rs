//! cache_sweep tool implementation.
//!
//! Runs one maintenance pass immediately. When a pass is already running the
//! request is folded into it and no report is returned.

use rmcp::{ErrorData as McpError, model::*};
use serde::Serialize;

use edgepin_core::{PinCache, SweepReport};

use crate::error::ServerError;

/// Output structure for cache_sweep tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSweepOutput {
    /// False when the pass was queued behind a running one.
    pub ran: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SweepReport>,
}

/// Implementation of the cache_sweep tool.
pub async fn sweep_impl(cache: &PinCache) -> Result<CallToolResult, McpError> {
    let report = cache.run_maintenance().await;
    let output = CacheSweepOutput { ran: report.is_some(), report };
    let json = serde_json::to_string_pretty(&output).map_err(ServerError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
