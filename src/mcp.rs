//! MCP protocol bridge.
//!
//! Exposes the [`ToolRegistry`] to MCP clients through rmcp's
//! [`ServerHandler`]: `list_tools` advertises each tool's schema and
//! `call_tool` runs it against the shared [`DocumentStore`]. Tool failures
//! are returned as `isError` results carrying the error text, so the agent
//! sees a readable message instead of a JSON-RPC fault.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::store::DocumentStore;
use crate::tools::{Tool as MemoryTool, ToolRegistry};

/// Each MCP session receives a clone of this struct; the store and the
/// tool set are shared behind `Arc`.
#[derive(Clone)]
pub struct McpBridge {
    store: Arc<DocumentStore>,
    tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(store: Arc<DocumentStore>, tools: Arc<ToolRegistry>) -> Self {
        Self { store, tools }
    }

    fn to_mcp_tool(tool: &dyn MemoryTool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> =
            match tool.parameters_schema() {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(tool.read_only())),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "vector-memory".to_string(),
                title: Some("Vector Memory".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Long-term memory for documents. Use save_to_memory to store text or PDF \
                 files, recall_from_memory to find the passages most relevant to a query, \
                 list_memory to see what is stored, and forget_from_memory to remove files."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        tracing::debug!(tool = %request.name, "mcp tool call");
        match self.tools.call(&request.name, params, &self.store).await {
            Some((text, false)) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Some((text, true)) => Ok(CallToolResult::error(vec![Content::text(text)])),
            None => Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    #[test]
    fn test_tool_descriptors_carry_schema_and_annotations() {
        let registry = ToolRegistry::with_builtins();
        let save = McpBridge::to_mcp_tool(registry.find("save_to_memory").unwrap());
        assert_eq!(save.name, "save_to_memory");
        assert_eq!(save.input_schema["required"], serde_json::json!(["file_paths"]));
        assert_eq!(
            save.annotations.as_ref().and_then(|a| a.read_only_hint),
            Some(false)
        );

        let recall = McpBridge::to_mcp_tool(registry.find("recall_from_memory").unwrap());
        assert_eq!(
            recall.annotations.as_ref().and_then(|a| a.read_only_hint),
            Some(true)
        );
    }
}
