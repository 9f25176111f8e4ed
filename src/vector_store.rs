//! Dense vector index.
//!
//! The production store is a SQLite file (`vectors.sqlite`) inside the
//! configured index directory. Each row holds one legal unit, its metadata
//! as JSON and its normalized embedding as a little-endian f32 BLOB.
//! Search loads every vector and ranks by dot product in Rust; the corpus of
//! a handful of statutes is small enough that brute force is adequate.
//!
//! A rebuild deletes the whole directory and creates it again, so a stale
//! index can never mix with a fresh one.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::embedding::{blob_to_vec, dot, vec_to_blob};
use crate::models::{best_first, LegalUnit, UnitMetadata};

/// Filename of the SQLite database inside the index directory.
pub const VECTOR_DB_FILE: &str = "vectors.sqlite";

/// Nearest-neighbour lookup over unit embeddings.
#[async_trait]
pub trait DenseIndex: Send + Sync {
    /// Return up to `k` units ranked by similarity to `query_vec`, best first.
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<(LegalUnit, f32)>>;
}

/// SQLite-backed dense index.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    path: PathBuf,
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

impl SqliteVectorStore {
    /// Open an existing index directory.
    pub async fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(VECTOR_DB_FILE);
        if !path.exists() {
            bail!(
                "vector index not found at {} (run `luat build` first)",
                path.display()
            );
        }
        let pool = connect(&path, false)
            .await
            .with_context(|| format!("failed to open vector index {}", path.display()))?;
        Ok(Self { pool, path })
    }

    /// Replace the index in `dir` with `units` and their `vectors`.
    ///
    /// `vectors[i]` must be the normalized embedding of `units[i]`.
    pub async fn rebuild(
        dir: &Path,
        units: &[LegalUnit],
        vectors: &[Vec<f32>],
        model: &str,
    ) -> Result<Self> {
        if units.len() != vectors.len() {
            bail!(
                "{} units but {} embeddings; refusing to build a partial index",
                units.len(),
                vectors.len()
            );
        }

        if dir.exists() {
            info!(dir = %dir.display(), "removing previous vector index");
            std::fs::remove_dir_all(dir)
                .with_context(|| format!("failed to remove {}", dir.display()))?;
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(VECTOR_DB_FILE);
        let pool = connect(&path, true).await?;
        create_schema(&pool).await?;

        let mut tx = pool.begin().await?;
        for (position, (unit, vector)) in units.iter().zip(vectors).enumerate() {
            let metadata_json = serde_json::to_string(&unit.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO units (position, citation, content, metadata_json, hash, model, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(position as i64)
            .bind(unit.citation())
            .bind(&unit.content)
            .bind(metadata_json)
            .bind(hash_text(&unit.content))
            .bind(model)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(units = units.len(), path = %path.display(), "vector index written");
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Embedding model the index was built with, or `None` when it is empty.
    pub async fn model(&self) -> Result<Option<String>> {
        let model: Option<String> = sqlx::query_scalar("SELECT model FROM units LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(model)
    }

    /// Fail unless the index was built with `model`.
    ///
    /// Vectors from different models live in unrelated spaces, so comparing
    /// them would rank by noise.
    pub async fn ensure_model(&self, model: &str) -> Result<()> {
        match self.model().await? {
            Some(built) if built != model => bail!(
                "vector index {} was built with embedding model '{}' but '{}' is configured; \
                 run `luat build` again",
                self.path.display(),
                built,
                model
            ),
            _ => Ok(()),
        }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS units (
            position INTEGER PRIMARY KEY,
            citation TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            hash TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl DenseIndex for SqliteVectorStore {
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<(LegalUnit, f32)>> {
        let rows = sqlx::query(
            "SELECT content, metadata_json, embedding FROM units ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            check_dims(query_vec, &vector)?;
            let metadata_json: String = row.get("metadata_json");
            let metadata: UnitMetadata = serde_json::from_str(&metadata_json)
                .context("corrupt unit metadata in vector index")?;
            let unit = LegalUnit {
                content: row.get("content"),
                metadata,
            };
            candidates.push((unit, dot(query_vec, &vector)));
        }

        debug!(scanned = candidates.len(), k, "dense search");
        Ok(rank(candidates, k))
    }
}

/// In-memory dense index, used by tests and for ad-hoc runs without a build.
#[derive(Default)]
pub struct MemoryVectorIndex {
    entries: Vec<(LegalUnit, Vec<f32>)>,
}

impl MemoryVectorIndex {
    pub fn new(entries: Vec<(LegalUnit, Vec<f32>)>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl DenseIndex for MemoryVectorIndex {
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<(LegalUnit, f32)>> {
        let mut scored = Vec::with_capacity(self.entries.len());
        for (unit, v) in &self.entries {
            check_dims(query_vec, v)?;
            scored.push((unit.clone(), dot(query_vec, v)));
        }
        Ok(rank(scored, k))
    }
}

fn check_dims(query_vec: &[f32], stored: &[f32]) -> Result<()> {
    if stored.len() != query_vec.len() {
        bail!(
            "query embedding has {} dimensions but the index stores {}; \
             was the embedding model changed since `luat build`?",
            query_vec.len(),
            stored.len()
        );
    }
    Ok(())
}

/// Sort by similarity descending (stable) and keep the top `k`.
fn rank(mut scored: Vec<(LegalUnit, f32)>, k: usize) -> Vec<(LegalUnit, f32)> {
    scored.sort_by(|a, b| best_first(a.1.into(), b.1.into()));
    scored.truncate(k);
    scored
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocType;

    fn unit(citation: &str) -> LegalUnit {
        LegalUnit {
            content: format!("Nội dung {}", citation),
            metadata: UnitMetadata {
                doc_type: DocType::Decree,
                law_name: "168/2024/NĐ-CP".to_string(),
                law_id: "168_2024_ND-CP".to_string(),
                article: "6".to_string(),
                clause: "1".to_string(),
                point: "all".to_string(),
                citation: citation.to_string(),
                is_parent: true,
            },
        }
    }

    #[tokio::test]
    async fn rebuild_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("vectors");
        let units = vec![unit("A"), unit("B"), unit("C")];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]];

        let store = SqliteVectorStore::rebuild(&index_dir, &units, &vectors, "test")
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let results = store.search(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.citation(), "B");
        assert_eq!(results[1].0.citation(), "C");
        assert_eq!(results[0].0, units[1]);
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("vectors");
        std::fs::create_dir_all(&index_dir).unwrap();
        std::fs::write(index_dir.join("stale.bin"), b"old").unwrap();

        let store = SqliteVectorStore::rebuild(&index_dir, &[unit("A")], &[vec![1.0]], "test")
            .await
            .unwrap();
        store.close().await;

        assert!(!index_dir.join("stale.bin").exists());
        let reopened = SqliteVectorStore::open(&index_dir).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rebuild_rejects_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            SqliteVectorStore::rebuild(dir.path(), &[unit("A"), unit("B")], &[vec![1.0]], "test")
                .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn open_missing_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SqliteVectorStore::open(&dir.path().join("none")).await.is_err());
    }

    #[tokio::test]
    async fn search_rejects_query_of_other_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let units = vec![unit("A"), unit("B")];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let store = SqliteVectorStore::rebuild(&dir.path().join("v"), &units, &vectors, "test")
            .await
            .unwrap();

        let err = store.search(&[0.0, 0.0, 1.0], 2).await.unwrap_err();
        assert!(err.to_string().contains("3 dimensions"));

        let memory = MemoryVectorIndex::new(vec![(unit("A"), vec![1.0, 0.0])]);
        assert!(memory.search(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn ensure_model_compares_build_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::rebuild(
            &dir.path().join("v"),
            &[unit("A")],
            &[vec![1.0]],
            "multilingual-e5-base",
        )
        .await
        .unwrap();

        assert_eq!(
            store.model().await.unwrap().as_deref(),
            Some("multilingual-e5-base")
        );
        store.ensure_model("multilingual-e5-base").await.unwrap();
        let err = store.ensure_model("text-embedding-3-small").await.unwrap_err();
        assert!(err.to_string().contains("run `luat build` again"));

        let empty = SqliteVectorStore::rebuild(&dir.path().join("e"), &[], &[], "x")
            .await
            .unwrap();
        empty.ensure_model("anything").await.unwrap();
    }

    #[tokio::test]
    async fn memory_index_ranks_by_dot_product() {
        let index = MemoryVectorIndex::new(vec![
            (unit("A"), vec![1.0, 0.0]),
            (unit("B"), vec![0.0, 1.0]),
        ]);
        let results = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.citation(), "A");
    }
}
