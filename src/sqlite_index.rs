//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Entries live in a single `entries` table: the opaque key, the
//! `source_path` (also kept inside `metadata_json`, verbatim), the chunk
//! content, and the embedding as a little-endian f32 BLOB. Search is
//! brute-force cosine similarity over every stored vector, which is
//! plenty for an agent's working memory.
//!
//! Several named indexes may share one database file. Every read is scoped
//! to the `<name>:` key prefix, so rows written under another name are
//! invisible to search, source listings, counts and the dimension guard.

use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use vector_memory_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use vector_memory_core::index::{key_prefix, new_key, VectorIndex};
use vector_memory_core::models::{EntryFilter, Metadata, NewEntry, SearchHit, SourceSummary};

use crate::db;
use crate::migrate;

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
    name: String,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }

    /// Connect to the database at `db_path` and apply migrations.
    pub async fn open(db_path: &Path, name: impl Into<String>) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, name))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn prefix(&self) -> String {
        key_prefix(&self.name)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn insert(&self, entries: &[NewEntry]) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let stored_dims: Option<i64> = sqlx::query_scalar(
            "SELECT dims FROM entries WHERE substr(key, 1, length(?1)) = ?1 LIMIT 1",
        )
        .bind(self.prefix())
        .fetch_optional(&mut *tx)
        .await?;
        let expected = stored_dims
            .map(|d| d as usize)
            .or_else(|| entries.first().map(|e| e.vector.len()));

        let now = chrono::Utc::now().timestamp();
        let mut keys = Vec::with_capacity(entries.len());

        for entry in entries {
            if let Some(dims) = expected {
                if entry.vector.len() != dims {
                    bail!(
                        "dimension mismatch: index holds {}-dim vectors, got {}",
                        dims,
                        entry.vector.len()
                    );
                }
            }
            let source_path = entry
                .source_path()
                .context("entry metadata is missing source_path")?;
            let metadata_json = serde_json::to_string(&entry.metadata)?;
            let key = new_key(&self.name);

            sqlx::query(
                r#"
                INSERT INTO entries (key, source_path, content, metadata_json, embedding, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key)
            .bind(source_path)
            .bind(&entry.content)
            .bind(&metadata_json)
            .bind(vec_to_blob(&entry.vector))
            .bind(entry.vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            keys.push(key);
        }

        tx.commit().await?;
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for key in keys {
            removed += sqlx::query("DELETE FROM entries WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn scan(&self, filter: &EntryFilter) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM entries
            WHERE (?1 IS NULL OR substr(key, 1, length(?1)) = ?1)
              AND (?2 IS NULL OR source_path = ?2)
            ORDER BY seq ASC
            "#,
        )
        .bind(&filter.key_prefix)
        .bind(&filter.source_path)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("key")).collect())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT key, content, metadata_json, embedding FROM entries
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(self.prefix())
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata = serde_json::from_str(&metadata_json)
                .with_context(|| "corrupt metadata_json in entries table")?;
            hits.push(SearchHit {
                key: row.get("key"),
                content: row.get("content"),
                metadata,
                score: cosine_similarity(query, &blob_to_vec(&blob)),
            });
        }

        // Stable sort: ties keep insertion (seq) order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn sources(&self) -> Result<Vec<SourceSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT source_path, COUNT(*) AS chunks
            FROM entries
            WHERE substr(key, 1, length(?1)) = ?1
            GROUP BY source_path
            ORDER BY source_path ASC
            "#,
        )
        .bind(self.prefix())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                SourceSummary {
                    source_path: row.get("source_path"),
                    chunks: chunks as usize,
                }
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entries WHERE substr(key, 1, length(?1)) = ?1",
        )
        .bind(self.prefix())
        .fetch_one(&self.pool)
        .await?;
        Ok(n as usize)
    }
}
