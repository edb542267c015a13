//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the storage seam of the document store: it
//! holds `(key, vector, content, metadata)` entries and answers k-nearest
//! neighbour queries. Backends are pluggable (in-memory here, SQLite in
//! the app crate).
//!
//! Implementations must be `Send + Sync` to work with async runtimes, must
//! store each entry's metadata verbatim (the `source_path` key is the only
//! durable link between a file and its chunks), and must reject vectors
//! whose dimensionality differs from entries already stored. `search`,
//! `sources`, `count` and the dimension guard see only entries under the
//! index's own `<name>:` key prefix.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert`](VectorIndex::insert) | Add a batch of entries, returning their keys |
//! | [`delete`](VectorIndex::delete) | Remove entries by key |
//! | [`scan`](VectorIndex::scan) | List keys matching an [`EntryFilter`] |
//! | [`search`](VectorIndex::search) | Rank entries by cosine similarity |
//! | [`sources`](VectorIndex::sources) | Per-file entry counts |
//! | [`count`](VectorIndex::count) | Total number of entries |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EntryFilter, NewEntry, SearchHit, SourceSummary};

pub use memory::InMemoryIndex;

/// Default key namespace for index entries.
pub const DEFAULT_INDEX_NAME: &str = "doc_chunks";

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert entries as one logical batch. Returns the new keys in order.
    async fn insert(&self, entries: &[NewEntry]) -> Result<Vec<String>>;

    /// Delete entries by key. Unknown keys are ignored. Returns the number
    /// of entries removed.
    async fn delete(&self, keys: &[String]) -> Result<usize>;

    /// List the keys of all entries matching `filter`, in insertion order.
    async fn scan(&self, filter: &EntryFilter) -> Result<Vec<String>>;

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Ties keep insertion order.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Entry counts grouped by `source_path`, sorted by path.
    async fn sources(&self) -> Result<Vec<SourceSummary>>;

    /// Total number of entries.
    async fn count(&self) -> Result<usize>;
}

/// Build an entry key in the `<index_name>:<uuid>` form.
pub fn new_key(index_name: &str) -> String {
    format!("{}:{}", index_name, uuid::Uuid::new_v4())
}

/// The `<index_name>:` prefix shared by every key of an index.
pub fn key_prefix(index_name: &str) -> String {
    format!("{}:", index_name)
}
