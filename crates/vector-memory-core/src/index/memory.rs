//! In-memory [`VectorIndex`] implementation.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Search is
//! brute-force cosine similarity over all stored vectors. Nothing is
//! persisted; the index lives as long as the process.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{EntryFilter, Metadata, NewEntry, SearchHit, SourceSummary};

use super::{key_prefix, new_key, VectorIndex, DEFAULT_INDEX_NAME};

struct StoredEntry {
    key: String,
    vector: Vec<f32>,
    content: String,
    metadata: Metadata,
    _created_at: i64,
}

/// In-memory index for tests and ephemeral sessions.
pub struct InMemoryIndex {
    name: String,
    entries: RwLock<Vec<StoredEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::with_name(DEFAULT_INDEX_NAME)
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Entries written under this index's name.
    fn own<'a>(&self, stored: &'a [StoredEntry]) -> impl Iterator<Item = &'a StoredEntry> {
        let prefix = key_prefix(&self.name);
        stored.iter().filter(move |e| e.key.starts_with(&prefix))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<StoredEntry>>> {
        self.entries
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredEntry>>> {
        self.entries
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(&self, entries: &[NewEntry]) -> Result<Vec<String>> {
        let mut stored = self.write()?;

        let expected = stored
            .first()
            .map(|e| e.vector.len())
            .or_else(|| entries.first().map(|e| e.vector.len()));
        if let Some(dims) = expected {
            if let Some(bad) = entries.iter().find(|e| e.vector.len() != dims) {
                bail!(
                    "dimension mismatch: index holds {}-dim vectors, got {}",
                    dims,
                    bad.vector.len()
                );
            }
        }

        let now = chrono::Utc::now().timestamp();
        let mut keys = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = new_key(&self.name);
            stored.push(StoredEntry {
                key: key.clone(),
                vector: entry.vector.clone(),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                _created_at: now,
            });
            keys.push(key);
        }
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut stored = self.write()?;
        let before = stored.len();
        stored.retain(|e| !keys.contains(&e.key));
        Ok(before - stored.len())
    }

    async fn scan(&self, filter: &EntryFilter) -> Result<Vec<String>> {
        let stored = self.read()?;
        Ok(stored
            .iter()
            .filter(|e| filter.matches(&e.key, &e.metadata))
            .map(|e| e.key.clone())
            .collect())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let stored = self.read()?;
        let mut hits: Vec<SearchHit> = self
            .own(&stored)
            .map(|e| SearchHit {
                key: e.key.clone(),
                content: e.content.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        // Stable sort: ties keep insertion order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn sources(&self) -> Result<Vec<SourceSummary>> {
        let stored = self.read()?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for e in self.own(&stored) {
            let path = e
                .metadata
                .get(crate::models::SOURCE_PATH_KEY)
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            *counts.entry(path.to_string()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(source_path, chunks)| SourceSummary {
                source_path,
                chunks,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let stored = self.read()?;
        Ok(self.own(&stored).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SOURCE_PATH_KEY;
    use serde_json::json;

    fn entry(path: &str, content: &str, vector: Vec<f32>) -> NewEntry {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_PATH_KEY.to_string(), json!(path));
        NewEntry {
            vector,
            content: content.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_insert_returns_prefixed_keys() {
        let index = InMemoryIndex::with_name("mem");
        let keys = index
            .insert(&[entry("/a", "one", vec![1.0, 0.0]), entry("/a", "two", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("mem:")));
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_scan_and_delete_by_source() {
        let index = InMemoryIndex::new();
        index
            .insert(&[
                entry("/a", "a1", vec![1.0, 0.0]),
                entry("/b", "b1", vec![0.0, 1.0]),
                entry("/a", "a2", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let keys = index.scan(&EntryFilter::source("/a")).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(index.delete(&keys).await.unwrap(), 2);
        assert!(index.scan(&EntryFilter::source("/a")).await.unwrap().is_empty());
        assert_eq!(index.scan(&EntryFilter::source("/b")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .insert(&[
                entry("/a", "east", vec![1.0, 0.0]),
                entry("/a", "north", vec![0.0, 1.0]),
                entry("/a", "northeast", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "north");
        assert_eq!(hits[1].content, "northeast");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_search_ties_keep_insertion_order() {
        let index = InMemoryIndex::new();
        index
            .insert(&[
                entry("/a", "first", vec![1.0, 0.0]),
                entry("/b", "second", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].content, "first");
        assert_eq!(hits[1].content, "second");
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let index = InMemoryIndex::new();
        assert!(index.search(&[1.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_dimension_mismatch() {
        let index = InMemoryIndex::new();
        index.insert(&[entry("/a", "x", vec![1.0, 0.0])]).await.unwrap();
        let err = index
            .insert(&[entry("/a", "y", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sources_grouped_and_sorted() {
        let index = InMemoryIndex::new();
        index
            .insert(&[
                entry("/z", "z1", vec![1.0]),
                entry("/a", "a1", vec![1.0]),
                entry("/z", "z2", vec![1.0]),
            ])
            .await
            .unwrap();
        let sources = index.sources().await.unwrap();
        assert_eq!(
            sources,
            vec![
                SourceSummary {
                    source_path: "/a".to_string(),
                    chunks: 1
                },
                SourceSummary {
                    source_path: "/z".to_string(),
                    chunks: 2
                },
            ]
        );
    }
}
