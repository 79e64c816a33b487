//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::pm_dose::{PmDoseParams, dose_impl};
use crate::tools::pm_extract::{PmExtractParams, extract_impl};

use pmdex_core::CacheDb;
use pmdex_core::config::AppConfig;
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

/// The main MCP server handler for mcp-pmdex.
#[derive(Clone)]
pub struct PmdexServer {
    db: CacheDb,
    config: AppConfig,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PmdexServer {
    /// Create a new server handler.
    pub fn new(db: CacheDb, config: AppConfig) -> Self {
        Self { db, config, tool_router: Self::tool_router() }
    }

    /// Resolve a monograph key to its extracted dosing evidence.
    #[tool(
        description = "Fetch a drug product monograph by key and return its extracted dosing evidence. Served from the cache when the document is unchanged."
    )]
    async fn pm_extract(&self, params: Parameters<PmExtractParams>) -> Result<CallToolResult, McpError> {
        extract_impl(&self.db, &self.config, params.0).await
    }

    /// Answer a dose question from persisted evidence through the safety gate.
    #[tool(
        description = "Propose a dose for one patient from a drug's extracted evidence. Every proposal passes a deterministic safety gate; a BLOCK decision carries no dose."
    )]
    async fn pm_dose(&self, params: Parameters<PmDoseParams>) -> Result<CallToolResult, McpError> {
        dose_impl(&self.db, &self.config, params.0).await
    }
}

impl ServerHandler for PmdexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-pmdex".into(),
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
