//! Storage interface for embedded document chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document store error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// A chunk as persisted, before it is handed to the pipeline as a
/// [`super::Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    /// Saved upload path the chunk was cut from.
    pub source: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity, higher is closer.
    pub score: f32,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts chunks with their embeddings; an existing chunk id is replaced.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), StoreError>;

    /// Best `limit` chunks by similarity to `query_embedding`, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, StoreError>;

    /// Removes every chunk cut from `source`, returning how many went.
    async fn delete_source(&self, source: &str) -> Result<usize, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
