//! Core data models used throughout vector-memory.
//!
//! These types represent the documents, chunks, and index entries that
//! flow through the save (ingestion) and recall (retrieval) pipeline.

use serde::{Deserialize, Serialize};

/// Free-form chunk metadata, stored verbatim alongside each index entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key carrying the canonical path of the originating file.
pub const SOURCE_PATH_KEY: &str = "source_path";
/// Metadata key carrying the chunk's position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key carrying the loader's content type (e.g. `application/pdf`).
pub const CONTENT_TYPE_KEY: &str = "content_type";
/// Metadata key carrying the SHA-256 hex digest of the chunk content.
pub const CONTENT_HASH_KEY: &str = "content_hash";

/// A loaded file, ready to be chunked.
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute, canonical path; the dedup and attribution key.
    pub source_path: String,
    pub content_type: String,
    pub text: String,
}

/// A slice of a document's text, tagged with metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn source_path(&self) -> Option<&str> {
        source_path_of(&self.metadata)
    }
}

/// An entry to be inserted into a [`VectorIndex`](crate::index::VectorIndex).
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: Metadata,
}

impl NewEntry {
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            vector,
            content: chunk.content,
            metadata: chunk.metadata,
        }
    }

    pub fn source_path(&self) -> Option<&str> {
        source_path_of(&self.metadata)
    }
}

/// A ranked result from [`VectorIndex::search`](crate::index::VectorIndex::search).
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub key: String,
    pub content: String,
    pub metadata: Metadata,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

impl SearchHit {
    /// The entry's source path, or `"unknown"` for entries written without one.
    pub fn source_path(&self) -> &str {
        source_path_of(&self.metadata).unwrap_or("unknown")
    }
}

/// Selects index entries during a scan.
///
/// Empty filters match every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub key_prefix: Option<String>,
    pub source_path: Option<String>,
}

impl EntryFilter {
    pub fn source(path: impl Into<String>) -> Self {
        Self {
            key_prefix: None,
            source_path: Some(path.into()),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn matches(&self, key: &str, metadata: &Metadata) -> bool {
        if let Some(prefix) = &self.key_prefix {
            if !key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        match &self.source_path {
            Some(path) => source_path_of(metadata) == Some(path.as_str()),
            None => true,
        }
    }
}

/// Per-file entry count, as reported by `sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source_path: String,
    pub chunks: usize,
}

fn source_path_of(metadata: &Metadata) -> Option<&str> {
    metadata.get(SOURCE_PATH_KEY).and_then(|v| v.as_str())
}
