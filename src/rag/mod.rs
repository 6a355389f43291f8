//! Reference documents for the tutor.
//!
//! - `DocumentStore` / `SqliteDocumentStore`: embedded chunks on disk
//! - `Retriever` / `EmbeddingRetriever`: similarity search used by the pipeline
//! - `ingest`: turning uploaded files into stored chunks

pub mod chunker;
pub mod ingest;
mod retriever;
mod sqlite;
mod store;

pub use chunker::TextSplitter;
pub use ingest::{DocumentIngestor, IngestError, IngestReport};
pub use retriever::{context_query, Document, EmbeddingRetriever, Retriever, CONTEXT_LIMIT};
pub use sqlite::SqliteDocumentStore;
pub use store::{ChunkSearchResult, DocumentStore, StoreError, StoredChunk};
