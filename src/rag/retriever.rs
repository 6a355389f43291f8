use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::store::DocumentStore;
use crate::capability::CapabilityError;
use crate::execution::Language;
use crate::llm::LlmProvider;

/// How many references the tutor pulls in per explanation.
pub const CONTEXT_LIMIT: usize = 3;

const CODE_SNIPPET_CHARS: usize = 200;

/// A retrieved reference passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Similarity-search capability. An empty result is not an error.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>, CapabilityError>;
}

#[async_trait]
impl<T: Retriever + ?Sized> Retriever for Arc<T> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>, CapabilityError> {
        (**self).search(query, limit).await
    }
}

/// Search query for references relevant to a program and how it failed:
/// `"{language} code"`, `"error: {stderr}"` when stderr is non-empty, then
/// the first 200 characters of the code, joined by single spaces.
pub fn context_query(language: Language, code: &str, stderr: &str) -> String {
    let mut parts = vec![format!("{} code", language)];
    if !stderr.is_empty() {
        parts.push(format!("error: {}", stderr));
    }
    parts.push(code.chars().take(CODE_SNIPPET_CHARS).collect());
    parts.join(" ")
}

/// Embeds the query with the embedding provider, then ranks stored chunks.
pub struct EmbeddingRetriever {
    embedder: Arc<dyn LlmProvider>,
    store: Arc<dyn DocumentStore>,
}

impl EmbeddingRetriever {
    pub fn new(embedder: Arc<dyn LlmProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>, CapabilityError> {
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let Some(query_embedding) = vectors.pop() else {
            return Err(CapabilityError::Embedding(
                "no embedding returned for query".to_string(),
            ));
        };

        let results = self
            .store
            .search(&query_embedding, limit)
            .await
            .map_err(|e| CapabilityError::Retrieval(e.to_string()))?;

        let preview: String = query.chars().take(50).collect();
        tracing::info!(
            "Found {} similar documents for query: {}...",
            results.len(),
            preview
        );

        Ok(results
            .into_iter()
            .map(|hit| {
                let mut metadata = hit.chunk.metadata;
                metadata.insert("score".to_string(), Value::from(hit.score));
                Document {
                    content: hit.chunk.content,
                    metadata,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRequest;
    use crate::rag::{SqliteDocumentStore, StoredChunk};

    #[test]
    fn query_without_stderr_has_language_and_code() {
        let query = context_query(Language::Python, "print('hi')", "");
        assert_eq!(query, "python code print('hi')");
    }

    #[test]
    fn query_with_stderr_includes_error_part() {
        let query = context_query(
            Language::Javascript,
            "foo()",
            "ReferenceError: foo is not defined",
        );
        assert_eq!(
            query,
            "javascript code error: ReferenceError: foo is not defined foo()"
        );
    }

    #[test]
    fn query_truncates_code_to_200_characters() {
        let code = "é".repeat(250);
        let query = context_query(Language::Python, &code, "");
        let snippet = query.strip_prefix("python code ").unwrap();
        assert_eq!(snippet.chars().count(), 200);
    }

    /// Maps text onto a fixed axis per keyword so similarity is predictable.
    struct KeywordEmbedder;

    #[async_trait]
    impl LlmProvider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keywords"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<String, CapabilityError> {
            Err(CapabilityError::Generation("not a chat model".to_string()))
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    vec![
                        text.contains("python") as u8 as f32,
                        text.contains("javascript") as u8 as f32,
                    ]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn embedding_retriever_returns_documents_with_scores() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteDocumentStore::open(dir.path().join("documents.db"))
                .await
                .unwrap(),
        );
        let chunk = |id: &str, content: &str| StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: "guide.md".to_string(),
            metadata: Map::new(),
        };
        store
            .insert_batch(vec![
                (chunk("guide_0", "python lists"), vec![1.0, 0.0]),
                (chunk("guide_1", "javascript arrays"), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let retriever = EmbeddingRetriever::new(Arc::new(KeywordEmbedder), store);
        let docs = retriever.search("python code", 1).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "python lists");
        assert!(docs[0].metadata["score"].as_f64().unwrap() > 0.99);
    }

    #[tokio::test]
    async fn embedding_failure_is_a_capability_error() {
        struct NoEmbeddings;

        #[async_trait]
        impl LlmProvider for NoEmbeddings {
            fn name(&self) -> &str {
                "chat-only"
            }

            async fn chat(&self, _request: ChatRequest) -> Result<String, CapabilityError> {
                Ok(String::new())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteDocumentStore::open(dir.path().join("documents.db"))
                .await
                .unwrap(),
        );
        let retriever = EmbeddingRetriever::new(Arc::new(NoEmbeddings), store);

        let err = retriever.search("anything", 3).await.unwrap_err();
        assert_eq!(err.to_string(), "chat-only does not provide embeddings");
    }
}
