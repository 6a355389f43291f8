//! SQLite-backed document store.
//!
//! Chunk text and metadata live in one table next to the embedding, which is
//! kept as a little-endian f32 blob. Search is a brute-force cosine scan,
//! which is plenty for a tutor's reference shelf.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkSearchResult, DocumentStore, StoreError, StoredChunk};

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteDocumentStore {
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_document_source ON document_chunks(source)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<Map<String, Value>>(&metadata_str).unwrap_or_default();

        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            metadata,
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = serde_json::to_string(&chunk.metadata)?;

            sqlx::query(
                "INSERT OR REPLACE INTO document_chunks (chunk_id, content, source, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!("Stored {} document chunks", items.len());
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT chunk_id, content, source, metadata, embedding FROM document_chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);

                Some(ChunkSearchResult {
                    chunk: Self::row_to_chunk(row),
                    score: cosine_similarity(query_embedding, &stored),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn delete_source(&self, source: &str) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE source = ?1")
            .bind(source)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, SqliteDocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteDocumentStore::open(dir.path().join("documents.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn chunk(id: &str, content: &str, source: &str) -> StoredChunk {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::from(source));
        metadata.insert("chunk_id".to_string(), Value::from(id));
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let (_dir, store) = test_store().await;

        store
            .insert_batch(vec![
                (chunk("a_0", "lists", "a.md"), vec![1.0, 0.0, 0.0]),
                (chunk("a_1", "dicts", "a.md"), vec![0.0, 1.0, 0.0]),
                (chunk("b_0", "loops", "b.md"), vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let results = store.search(&[1.0, 0.1, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a_0", "b_0"]);
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].chunk.metadata["source"], "a.md");
    }

    #[tokio::test]
    async fn reinserting_a_chunk_id_replaces_it() {
        let (_dir, store) = test_store().await;

        store
            .insert_batch(vec![(chunk("a_0", "old", "a.md"), vec![1.0])])
            .await
            .unwrap();
        store
            .insert_batch(vec![(chunk("a_0", "new", "a.md"), vec![1.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.search(&[1.0], 5).await.unwrap();
        assert_eq!(results[0].chunk.content, "new");
    }

    #[tokio::test]
    async fn delete_source_removes_only_that_source() {
        let (_dir, store) = test_store().await;

        store
            .insert_batch(vec![
                (chunk("a_0", "x", "a.md"), vec![1.0]),
                (chunk("a_1", "y", "a.md"), vec![1.0]),
                (chunk("b_0", "z", "b.md"), vec![1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_source("a.md").await.unwrap(), 2);
        assert_eq!(store.delete_source("missing.md").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_store_and_zero_limit_return_nothing() {
        let (_dir, store) = test_store().await;
        assert!(store.search(&[1.0, 0.0], 3).await.unwrap().is_empty());

        store
            .insert_batch(vec![(chunk("a_0", "x", "a.md"), vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(store.search(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[test]
    fn cosine_of_mismatched_or_zero_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[3.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
