//! # Vector Memory
//!
//! Long-term document memory for AI agents.
//!
//! Files (plain text, Markdown, PDF, ...) are split into overlapping
//! chunks, embedded, and stored in a vector index. Agents recall the
//! passages most similar to a query. Saving a file again replaces its
//! previous chunks, so memory never holds two generations of one file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────────────┐   ┌──────────────┐
//! │  Loader  │──▶│        DocumentStore        │──▶│ VectorIndex  │
//! │ txt/pdf  │   │ dedup → chunk → embed → ins │   │ SQLite / mem │
//! └──────────┘   └──────────────┬──────────────┘   └──────────────┘
//!                               │
//!                 ┌─────────────┴─────────────┐
//!                 ▼                           ▼
//!           ┌──────────┐               ┌────────────┐
//!           │   CLI    │               │    MCP     │
//!           │  (vmem)  │               │ stdio/HTTP │
//!           └──────────┘               └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vmem init                          # create database
//! vmem save notes.md paper.pdf       # chunk, embed and store
//! vmem recall "what did the paper conclude?" -k 5
//! vmem serve stdio                   # expose the tools to an agent
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`embedding`] | Embedding providers |
//! | [`loader`] | Text and PDF loaders |
//! | [`store`] | Save / recall / forget |
//! | [`tools`] | Agent-facing tools |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | stdio and HTTP transports |

pub mod config;
pub mod db;
pub mod embedding;
pub mod loader;
pub mod logging;
pub mod mcp;
pub mod migrate;
pub mod server;
pub mod sqlite_index;
pub mod store;
pub mod tools;
