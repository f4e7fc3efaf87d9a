//! cache_entries tool implementation.
//!
//! Lists tracked entries, most recently accessed first.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use edgepin_core::{CacheEntry, PinCache};

use crate::error::ServerError;

/// Input parameters for cache_entries tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntriesParams {
    /// Maximum number of entries to return (default: all).
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryView {
    pub path: String,
    pub pinned_at: i64,
    pub last_access: i64,
    pub ttl_ms: i64,
    pub expires_at: i64,
    /// `null` until the size has been resolved.
    pub size_bytes: Option<u64>,
}

impl From<&CacheEntry> for EntryView {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            path: entry.path.clone(),
            pinned_at: entry.pinned_at,
            last_access: entry.last_access,
            ttl_ms: entry.ttl_ms,
            expires_at: entry.expires_at(),
            size_bytes: entry.size_bytes,
        }
    }
}

/// Output structure for cache_entries tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntriesOutput {
    /// Number of tracked entries before the limit was applied.
    pub total: usize,
    pub entries: Vec<EntryView>,
}

/// Implementation of the cache_entries tool.
pub async fn entries_impl(cache: &PinCache, params: CacheEntriesParams) -> Result<CallToolResult, McpError> {
    let all = cache.entries().await;
    let total = all.len();
    let entries = all.iter().take(params.limit.unwrap_or(usize::MAX)).map(EntryView::from).collect();

    let output = CacheEntriesOutput { total, entries };
    let json = serde_json::to_string_pretty(&output).map_err(ServerError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
