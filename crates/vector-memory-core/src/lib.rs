//! # Vector Memory Core
//!
//! Shared logic for vector-memory: data models, the overlapping text
//! chunker, the embedding provider trait, the vector index abstraction,
//! and the error taxonomy surfaced by save/recall.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-specific dependencies. Concrete loaders, providers and the
//! SQLite index live in the `vector-memory` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;

pub use error::MemoryError;
