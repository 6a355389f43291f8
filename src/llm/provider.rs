use std::sync::Arc;

use async_trait::async_trait;

use super::types::ChatRequest;
use crate::capability::CapabilityError;

/// Text-generation (and optionally embedding) capability.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name for logs (e.g. "groq", "lmstudio")
    fn name(&self) -> &str;

    /// check if the provider is reachable
    async fn health_check(&self) -> Result<bool, CapabilityError> {
        Ok(true)
    }

    /// chat completion, single request/response
    async fn chat(&self, request: ChatRequest) -> Result<String, CapabilityError>;

    /// one embedding vector per input, in input order
    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        Err(CapabilityError::Embedding(format!(
            "{} does not provide embeddings",
            self.name()
        )))
    }
}

#[async_trait]
impl<T: LlmProvider + ?Sized> LlmProvider for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn health_check(&self) -> Result<bool, CapabilityError> {
        (**self).health_check().await
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, CapabilityError> {
        (**self).chat(request).await
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        (**self).embed(inputs).await
    }
}
