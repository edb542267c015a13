//! The document store: deduplicated ingestion and similarity recall.
//!
//! A [`DocumentStore`] is built once at start-up and shared (behind an
//! `Arc`) by every CLI command and MCP session. It owns the three
//! collaborators of the pipeline:
//!
//! ```text
//! save:   paths ─► canonicalize + pre-flight ─► purge_stale ─► load ─► chunk ─► embed ─► insert
//! recall: query ─► embed ─► search ─► Recall
//! ```
//!
//! `purge_stale` is best-effort (failures are logged and the save carries
//! on); every later phase is fail-fast. Saves and forgets of the same
//! canonical path are serialized by a per-path async lock; recall never
//! locks.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context;
use tokio::sync::{Mutex, OwnedMutexGuard};

use vector_memory_core::chunk::{chunk_document, validate_params};
use vector_memory_core::embedding::EmbeddingProvider;
use vector_memory_core::index::{key_prefix, InMemoryIndex, VectorIndex};
use vector_memory_core::models::{Chunk, EntryFilter, NewEntry, SearchHit, SourceSummary};
use vector_memory_core::{error::Result, MemoryError};

use crate::config::{Config, IndexBackend};
use crate::embedding::create_provider;
use crate::loader::LoaderRegistry;
use crate::sqlite_index::SqliteIndex;

/// Tunables for a [`DocumentStore`], usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub index_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_k: usize,
    pub max_k: usize,
    pub batch_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl StoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            index_name: config.index.name.clone(),
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            default_k: config.retrieval.default_k,
            max_k: config.retrieval.max_k,
            batch_size: config.embedding.batch_size.max(1),
        }
    }
}

/// Outcome of a successful [`DocumentStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub files: usize,
    pub chunks: usize,
    /// Entries from earlier saves of the same paths that were purged.
    pub replaced: usize,
}

impl fmt::Display for SaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "✅ Successfully saved {} file(s) to memory ({} chunks). Content is now available for recall.",
            self.files, self.chunks
        )
    }
}

/// Outcome of [`DocumentStore::forget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgetReport {
    pub files: usize,
    pub removed: usize,
}

impl fmt::Display for ForgetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Removed {} chunk(s) for {} file(s) from memory.",
            self.removed, self.files
        )
    }
}

/// Result of a recall. An empty index or no match is not an error.
#[derive(Debug, Clone)]
pub enum Recall {
    Nothing,
    Found(Vec<SearchHit>),
}

impl Recall {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Recall::Nothing => &[],
            Recall::Found(hits) => hits,
        }
    }
}

impl fmt::Display for Recall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recall::Nothing => f.write_str("Nothing found in memory matching your query."),
            Recall::Found(hits) => {
                let blocks: Vec<String> = hits
                    .iter()
                    .enumerate()
                    .map(|(i, hit)| {
                        format!(
                            "**Result {}**\nSource: {}\n\nContent:\n{}\n",
                            i + 1,
                            hit.source_path(),
                            hit.content
                        )
                    })
                    .collect();
                f.write_str(&blocks.join("\n---\n"))
            }
        }
    }
}

type LockMap = HashMap<String, Arc<Mutex<()>>>;

/// Async mutexes keyed by canonical path. Entries live only while some
/// caller holds or waits on them.
#[derive(Default)]
struct PathLocks {
    locks: Arc<StdMutex<LockMap>>,
}

impl PathLocks {
    /// Lock every path in `paths`. `BTreeSet` iteration order is sorted,
    /// so two callers with overlapping sets cannot deadlock.
    async fn acquire(&self, paths: &BTreeSet<String>) -> PathGuards {
        let handles: Vec<Arc<Mutex<()>>> = {
            let mut locks = lock_map(&self.locks);
            paths
                .iter()
                .map(|p| Arc::clone(locks.entry(p.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        PathGuards {
            guards,
            paths: paths.iter().cloned().collect(),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

fn lock_map(locks: &StdMutex<LockMap>) -> std::sync::MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held path locks. Dropping releases them and prunes map entries nobody
/// else references.
struct PathGuards {
    guards: Vec<OwnedMutexGuard<()>>,
    paths: Vec<String>,
    locks: Arc<StdMutex<LockMap>>,
}

impl Drop for PathGuards {
    fn drop(&mut self) {
        self.guards.clear();
        let mut locks = lock_map(&self.locks);
        for path in &self.paths {
            if locks.get(path).is_some_and(|m| Arc::strong_count(m) == 1) {
                locks.remove(path);
            }
        }
    }
}

/// A file accepted by the pre-flight check.
struct Target {
    path: PathBuf,
    source_path: String,
}

pub struct DocumentStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    loaders: LoaderRegistry,
    options: StoreOptions,
    locks: PathLocks,
}

impl DocumentStore {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        loaders: LoaderRegistry,
        options: StoreOptions,
    ) -> Self {
        Self {
            index,
            embedder,
            loaders,
            options,
            locks: PathLocks::default(),
        }
    }

    /// Build a store from configuration: opens (and migrates) the SQLite
    /// index or creates an in-memory one, and instantiates the embedder.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let index: Arc<dyn VectorIndex> = match config.index.backend {
            IndexBackend::Sqlite => Arc::new(
                SqliteIndex::open(&config.db.path, config.index.name.clone())
                    .await
                    .with_context(|| {
                        format!("Failed to open index at {}", config.db.path.display())
                    })?,
            ),
            IndexBackend::Memory => Arc::new(InMemoryIndex::with_name(config.index.name.clone())),
        };
        let embedder = create_provider(&config.embedding)?;
        let loaders = LoaderRegistry::from_config(&config.loaders);

        tracing::info!(
            backend = ?config.index.backend,
            index = %config.index.name,
            model = embedder.model_name(),
            "document store ready"
        );
        Ok(Self::new(
            index,
            embedder,
            loaders,
            StoreOptions::from_config(config),
        ))
    }

    /// Save files into memory, replacing any chunks from earlier saves of
    /// the same files.
    pub async fn save(
        &self,
        paths: &[PathBuf],
        chunk_size: Option<usize>,
        chunk_overlap: Option<usize>,
    ) -> Result<SaveReport> {
        let chunk_size = chunk_size.unwrap_or(self.options.chunk_size);
        let chunk_overlap = chunk_overlap.unwrap_or(self.options.chunk_overlap);
        validate_params(chunk_size, chunk_overlap)?;
        if paths.is_empty() {
            return Err(MemoryError::InvalidArgument(
                "file_paths must contain at least one path".to_string(),
            ));
        }

        let targets = self.preflight(paths)?;
        let keys: BTreeSet<String> = targets.iter().map(|t| t.source_path.clone()).collect();
        let _guards = self.locks.acquire(&keys).await;

        let replaced = self.purge_stale(&targets).await;
        let chunks = self.ingest(&targets, chunk_size, chunk_overlap).await?;

        tracing::info!(
            files = targets.len(),
            chunks,
            replaced,
            "saved files to memory"
        );
        Ok(SaveReport {
            files: targets.len(),
            chunks,
            replaced,
        })
    }

    /// Canonicalize and check every path before anything is mutated.
    /// Duplicates (after canonicalization) are collapsed, first one wins.
    fn preflight(&self, paths: &[PathBuf]) -> Result<Vec<Target>> {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::with_capacity(paths.len());

        for path in paths {
            let canonical = std::fs::canonicalize(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => MemoryError::NotFound {
                    path: absolute(path),
                },
                _ => MemoryError::Load {
                    path: absolute(path),
                    message: e.to_string(),
                },
            })?;
            self.loaders.resolve(&canonical)?;

            let source_path = canonical.to_string_lossy().into_owned();
            if seen.insert(source_path.clone()) {
                targets.push(Target {
                    path: canonical,
                    source_path,
                });
            }
        }
        Ok(targets)
    }

    /// Delete every entry of the given files. Failures are logged and
    /// skipped. Returns the number of entries removed.
    async fn purge_stale(&self, targets: &[Target]) -> usize {
        let prefix = key_prefix(&self.options.index_name);
        let mut removed = 0;

        for target in targets {
            let filter = EntryFilter::source(&target.source_path).with_key_prefix(&prefix);
            let keys = match self.index.scan(&filter).await {
                Ok(keys) => keys,
                Err(e) => {
                    tracing::warn!(path = %target.source_path, error = %e, "could not scan for stale chunks");
                    continue;
                }
            };
            if keys.is_empty() {
                continue;
            }
            match self.index.delete(&keys).await {
                Ok(n) => {
                    tracing::debug!(path = %target.source_path, removed = n, "purged stale chunks");
                    removed += n;
                }
                Err(e) => {
                    tracing::warn!(path = %target.source_path, error = %e, "could not delete stale chunks");
                }
            }
        }
        removed
    }

    /// Load, chunk, embed and insert. Any failure aborts the whole call
    /// before the index is written.
    async fn ingest(
        &self,
        targets: &[Target],
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<usize> {
        let mut chunks: Vec<Chunk> = Vec::new();

        for target in targets {
            let loaders = self.loaders.clone();
            let path = target.path.clone();
            let source_path = target.source_path.clone();
            let document =
                tokio::task::spawn_blocking(move || loaders.load_document(&path, &source_path))
                    .await
                    .map_err(|e| MemoryError::Load {
                        path: target.path.clone(),
                        message: e.to_string(),
                    })??;

            let doc_chunks = chunk_document(&document, chunk_size, chunk_overlap)?;
            tracing::debug!(
                path = %target.source_path,
                content_type = %document.content_type,
                chunks = doc_chunks.len(),
                "chunked document"
            );
            chunks.extend(doc_chunks);
        }

        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let entries: Vec<NewEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| NewEntry::from_chunk(chunk, vector))
            .collect();

        let keys = self
            .index
            .insert(&entries)
            .await
            .map_err(MemoryError::index)?;
        Ok(keys.len())
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.options.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| MemoryError::embedding(format!("{:#}", e)))?;
            if embedded.len() != texts.len() {
                return Err(MemoryError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            for vector in &embedded {
                self.check_dims(vector)?;
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        let expected = self.embedder.dims();
        if expected > 0 && vector.len() != expected {
            return Err(MemoryError::Embedding(format!(
                "model {} produced a {}-dim vector, expected {}",
                self.embedder.model_name(),
                vector.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Return the `k` chunks most similar to `query`.
    pub async fn recall(&self, query: &str, k: Option<usize>) -> Result<Recall> {
        if query.trim().is_empty() {
            return Err(MemoryError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }
        let requested = k.unwrap_or(self.options.default_k);
        if requested == 0 {
            return Err(MemoryError::InvalidArgument("k must be >= 1".to_string()));
        }
        let k = requested.min(self.options.max_k);
        if k < requested {
            tracing::debug!(requested, max_k = self.options.max_k, "clamped k");
        }

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| MemoryError::embedding(format!("{:#}", e)))?;
        self.check_dims(&vector)?;

        let hits = self
            .index
            .search(&vector, k)
            .await
            .map_err(MemoryError::index)?;
        tracing::debug!(k, hits = hits.len(), "recall");

        if hits.is_empty() {
            Ok(Recall::Nothing)
        } else {
            Ok(Recall::Found(hits))
        }
    }

    /// Remove every entry saved for `paths`. Paths that no longer exist on
    /// disk are still matched by their absolute form.
    pub async fn forget(&self, paths: &[PathBuf]) -> Result<ForgetReport> {
        if paths.is_empty() {
            return Err(MemoryError::InvalidArgument(
                "file_paths must contain at least one path".to_string(),
            ));
        }

        let keys: BTreeSet<String> = paths
            .iter()
            .map(|p| {
                std::fs::canonicalize(p)
                    .unwrap_or_else(|_| absolute(p))
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        let _guards = self.locks.acquire(&keys).await;

        let prefix = key_prefix(&self.options.index_name);
        let mut removed = 0;
        for source_path in &keys {
            let filter = EntryFilter::source(source_path.as_str()).with_key_prefix(&prefix);
            let entry_keys = self.index.scan(&filter).await.map_err(MemoryError::index)?;
            if !entry_keys.is_empty() {
                removed += self
                    .index
                    .delete(&entry_keys)
                    .await
                    .map_err(MemoryError::index)?;
            }
        }

        tracing::info!(files = keys.len(), removed, "forgot files");
        Ok(ForgetReport {
            files: keys.len(),
            removed,
        })
    }

    /// Saved files and their chunk counts, sorted by path.
    pub async fn sources(&self) -> Result<Vec<SourceSummary>> {
        self.index.sources().await.map_err(MemoryError::index)
    }
}

/// Absolute form of `path` without touching the filesystem.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
