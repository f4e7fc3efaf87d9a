//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the cache operations.
use std::sync::Arc;

use crate::tools::cache::{CacheEntriesParams, entries_impl, stats_impl, sweep_impl};
use crate::tools::{CacheObserveParams, CacheTouchParams, observe_impl, touch_impl};

use edgepin_core::PinCache;
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

/// The MCP server handler for edgepin.
#[derive(Clone)]
pub struct EdgePinServer {
    cache: Arc<PinCache>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl EdgePinServer {
    pub fn new(cache: Arc<PinCache>) -> Self {
        Self { cache, tool_router: Self::tool_router() }
    }

    /// Forward one completed gateway fetch to the cache.
    #[tool(
        description = "Report a completed gateway fetch (url, method, status, optional x-ipfs-path). Successful GETs of /ipfs/ or /ipns/ URLs are pinned in the background."
    )]
    async fn cache_observe(&self, params: Parameters<CacheObserveParams>) -> Result<CallToolResult, McpError> {
        observe_impl(&self.cache, params.0).await
    }

    #[tool(
        description = "Touch a gateway URL or content path now. Refreshes a tracked entry or pins a new one, and returns the decision."
    )]
    async fn cache_touch(&self, params: Parameters<CacheTouchParams>) -> Result<CallToolResult, McpError> {
        touch_impl(&self.cache, params.0).await
    }

    #[tool(description = "Show cache statistics: entry count, tracked bytes, configured limits, pending index write.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.cache).await
    }

    /// Run a maintenance pass now.
    #[tool(
        description = "Run one maintenance pass now: unpin expired entries, entries above the per-item limit, and least-recently-used entries until under quota."
    )]
    async fn cache_sweep(&self) -> Result<CallToolResult, McpError> {
        sweep_impl(&self.cache).await
    }

    #[tool(description = "List tracked cache entries, most recently accessed first. Optional limit.")]
    async fn cache_entries(&self, params: Parameters<CacheEntriesParams>) -> Result<CallToolResult, McpError> {
        entries_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for EdgePinServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "edgepin".into(),
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
