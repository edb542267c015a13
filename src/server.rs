//! MCP server transports.
//!
//! Two ways to reach the memory tools:
//!
//! - **stdio**: one MCP session over stdin/stdout. This is what agent
//!   hosts launch as a subprocess. Logs go to stderr.
//! - **HTTP**: rmcp's streamable HTTP transport mounted at `/mcp` in an
//!   axum router, plus a plain `GET /health`.
//!
//! # Endpoints (HTTP)
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST`/`GET`/`DELETE` | `/mcp` | MCP streamable HTTP sessions |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based MCP
//! clients can connect.
//!
//! # Agent host configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "memory": {
//!       "command": "vmem",
//!       "args": ["--config", "/path/to/memory.toml", "serve", "stdio"]
//!     }
//!   }
//! }
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::{transport::stdio, ServiceExt};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::mcp::McpBridge;
use crate::store::DocumentStore;
use crate::tools::ToolRegistry;

/// Serve one MCP session over stdin/stdout until the client disconnects.
pub async fn run_stdio(store: Arc<DocumentStore>) -> Result<()> {
    let bridge = McpBridge::new(store, Arc::new(ToolRegistry::with_builtins()));

    tracing::info!("serving MCP over stdio");
    let service = bridge
        .serve(stdio())
        .await
        .context("Failed to start MCP stdio session")?;
    service.waiting().await?;
    tracing::info!("MCP stdio session closed");
    Ok(())
}

/// Build the HTTP router: `/mcp` (streamable HTTP) and `/health`.
pub fn router(store: Arc<DocumentStore>) -> Router {
    let tools = Arc::new(ToolRegistry::with_builtins());
    let mcp_service = StreamableHttpService::new(
        move || Ok(McpBridge::new(store.clone(), tools.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
}

/// Serve MCP over HTTP on `bind_addr` until Ctrl-C.
pub async fn run_http(bind_addr: &str, store: Arc<DocumentStore>) -> Result<()> {
    let app = router(store);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!(addr = %bind_addr, "MCP server listening on http://{}/mcp", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadersConfig;
    use crate::embedding::HashProvider;
    use crate::loader::LoaderRegistry;
    use crate::store::StoreOptions;
    use std::time::Duration;
    use vector_memory_core::index::InMemoryIndex;

    async fn spawn_server() -> String {
        let store = Arc::new(DocumentStore::new(
            Arc::new(InMemoryIndex::new()),
            Arc::new(HashProvider::new(64)),
            LoaderRegistry::from_config(&LoadersConfig::default()),
            StoreOptions::default(),
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(store)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health_reports_ok_and_version() {
        let base = spawn_server().await;
        let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert!(resp.status().is_success());

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_mcp_endpoint_answers_initialize() {
        let base = spawn_server().await;
        let initialize = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "http-test", "version": "0.0.0" }
            }
        });

        let mut resp = reqwest::Client::new()
            .post(format!("{}/mcp", base))
            .header("Accept", "application/json, text/event-stream")
            .json(&initialize)
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success(), "status {}", resp.status());
        assert!(resp.headers().contains_key("mcp-session-id"));

        // The reply arrives as an SSE event; read until it shows up.
        let mut body = String::new();
        let read = tokio::time::timeout(Duration::from_secs(10), async {
            while !body.contains("protocolVersion") {
                match resp.chunk().await.unwrap() {
                    Some(bytes) => body.push_str(&String::from_utf8_lossy(&bytes)),
                    None => break,
                }
            }
        })
        .await;
        assert!(read.is_ok(), "timed out waiting for initialize result");
        assert!(body.contains("\"id\":1"), "body: {}", body);
        assert!(body.contains("vector-memory"), "body: {}", body);
    }
}
