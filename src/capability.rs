//! Shared plumbing for the external capabilities the tutor depends on
//! (text generation, embeddings, similarity search).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::llm::{ChatRequest, LlmProvider};
use crate::rag::{Document, Retriever};

/// Failure of a single capability call.
///
/// Message-carrying variants display the bare upstream message so it can be
/// embedded verbatim in progress labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("{0}")]
    Generation(String),
    #[error("{0}")]
    Embedding(String),
    #[error("{0}")]
    Retrieval(String),
    #[error("{capability} call timed out after {after:?}")]
    Timeout {
        capability: &'static str,
        after: Duration,
    },
}

/// Runs `call` under an optional deadline; an exceeded deadline becomes a
/// [`CapabilityError::Timeout`] and the call future is dropped.
pub async fn with_deadline<T, F>(
    capability: &'static str,
    deadline: Option<Duration>,
    call: F,
) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    let Some(after) = deadline else {
        return call.await;
    };
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout { capability, after }),
    }
}

/// Serializes calls into a capability that cannot take concurrent requests.
///
/// The lock is held only for the duration of each individual call, never
/// across pipeline stages.
pub struct Serialized<T> {
    inner: T,
    lock: Mutex<()>,
}

impl<T> Serialized<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: LlmProvider> LlmProvider for Serialized<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health_check(&self) -> Result<bool, CapabilityError> {
        self.inner.health_check().await
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, CapabilityError> {
        let _guard = self.lock.lock().await;
        self.inner.chat(request).await
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let _guard = self.lock.lock().await;
        self.inner.embed(inputs).await
    }
}

#[async_trait]
impl<T: Retriever> Retriever for Serialized<T> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>, CapabilityError> {
        let _guard = self.lock.lock().await;
        self.inner.search(query, limit).await
    }
}
