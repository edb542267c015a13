//! Agent-facing tools.
//!
//! Each [`Tool`] wraps one [`DocumentStore`] operation behind a JSON
//! parameter schema and a plain-text result, which is what MCP clients
//! and the CLI hand back to the agent. Failures become a single
//! descriptive line (see [`error_text`]) rather than protocol errors.
//!
//! | Tool | Store operation |
//! |------|-----------------|
//! | `save_to_memory` | [`DocumentStore::save`] |
//! | `recall_from_memory` | [`DocumentStore::recall`] |
//! | `forget_from_memory` | [`DocumentStore::forget`] |
//! | `list_memory` | [`DocumentStore::sources`] |

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use vector_memory_core::models::SourceSummary;
use vector_memory_core::MemoryError;

use crate::store::DocumentStore;

#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as advertised to MCP clients (e.g. `"save_to_memory"`).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Whether the tool leaves the index unchanged.
    fn read_only(&self) -> bool {
        false
    }

    /// JSON Schema (`type: "object"`) of the accepted arguments.
    fn parameters_schema(&self) -> Value;

    /// Run the tool against `store`. `params` is always a JSON object.
    async fn execute(&self, params: Value, store: &DocumentStore) -> Result<String>;
}

/// Render a tool failure the way agents see it.
///
/// Load failures already read `Error processing <path>: ...`; everything
/// else is prefixed with `Error: `.
pub fn error_text(err: &anyhow::Error) -> String {
    match err.downcast_ref::<MemoryError>() {
        Some(MemoryError::Load { .. }) => err.to_string(),
        _ => format!("Error: {:#}", err),
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(tool: &str, params: Value) -> Result<T> {
    serde_json::from_value(params).with_context(|| format!("invalid arguments for {}", tool))
}

#[derive(Debug, Deserialize)]
struct SaveParams {
    file_paths: Vec<PathBuf>,
    #[serde(default)]
    chunk_size: Option<usize>,
    #[serde(default)]
    chunk_overlap: Option<usize>,
}

pub struct SaveTool;

#[async_trait]
impl Tool for SaveTool {
    fn name(&self) -> &str {
        "save_to_memory"
    }

    fn description(&self) -> &str {
        "Save documents to memory for future recall. Each file (plain text or PDF) \
         is split into overlapping chunks and embedded. Saving a file again \
         replaces what was stored for it before."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "description": "Paths of the files to save"
                },
                "chunk_size": {
                    "type": "integer",
                    "minimum": 1,
                    "default": 1000,
                    "description": "Maximum characters per chunk"
                },
                "chunk_overlap": {
                    "type": "integer",
                    "minimum": 0,
                    "default": 100,
                    "description": "Characters repeated between consecutive chunks"
                }
            },
            "required": ["file_paths"]
        })
    }

    async fn execute(&self, params: Value, store: &DocumentStore) -> Result<String> {
        let params: SaveParams = parse_params(self.name(), params)?;
        let report = store
            .save(&params.file_paths, params.chunk_size, params.chunk_overlap)
            .await?;
        Ok(report.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RecallParams {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

pub struct RecallTool;

#[async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        "recall_from_memory"
    }

    fn description(&self) -> &str {
        "Recall the saved passages most relevant to a query, best match first, \
         each with the file it came from."
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" },
                "k": {
                    "type": "integer",
                    "minimum": 1,
                    "default": 3,
                    "description": "Number of passages to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, store: &DocumentStore) -> Result<String> {
        let params: RecallParams = parse_params(self.name(), params)?;
        let recall = store.recall(&params.query, params.k).await?;
        Ok(recall.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ForgetParams {
    file_paths: Vec<PathBuf>,
}

pub struct ForgetTool;

#[async_trait]
impl Tool for ForgetTool {
    fn name(&self) -> &str {
        "forget_from_memory"
    }

    fn description(&self) -> &str {
        "Remove everything saved from the given files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "description": "Paths of the files to forget"
                }
            },
            "required": ["file_paths"]
        })
    }

    async fn execute(&self, params: Value, store: &DocumentStore) -> Result<String> {
        let params: ForgetParams = parse_params(self.name(), params)?;
        let report = store.forget(&params.file_paths).await?;
        Ok(report.to_string())
    }
}

pub struct ListTool;

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        "list_memory"
    }

    fn description(&self) -> &str {
        "List the files currently held in memory with their chunk counts."
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, store: &DocumentStore) -> Result<String> {
        Ok(format_sources(&store.sources().await?))
    }
}

pub fn format_sources(sources: &[SourceSummary]) -> String {
    if sources.is_empty() {
        return "Memory is empty.".to_string();
    }
    let mut out = format!("Memory holds {} file(s):", sources.len());
    for source in sources {
        out.push_str(&format!(
            "\n- {} ({} chunks)",
            source.source_path, source.chunks
        ));
    }
    out
}

/// The set of tools served to agents.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry pre-loaded with save, recall, forget and list.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SaveTool));
        registry.register(Box::new(RecallTool));
        registry.register(Box::new(ForgetTool));
        registry.register(Box::new(ListTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Run `name` and fold any failure into its error text.
    /// Returns `(text, is_error)`; `None` if no such tool exists.
    pub async fn call(
        &self,
        name: &str,
        params: Value,
        store: &DocumentStore,
    ) -> Option<(String, bool)> {
        let tool = self.find(name)?;
        let outcome = match tool.execute(params, store).await {
            Ok(text) => (text, false),
            Err(e) => {
                tracing::warn!(tool = name, error = %format!("{:#}", e), "tool call failed");
                (error_text(&e), true)
            }
        };
        Some(outcome)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
