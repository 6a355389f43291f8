//! Provider for any server speaking the OpenAI REST dialect
//! (Groq, LM Studio, llama.cpp server, vLLM, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::capability::CapabilityError;

#[derive(Clone)]
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<bool, CapabilityError> {
        let url = format!("{}/v1/models", self.base_url);
        let res = self.authorize(self.client.get(&url)).send().await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, CapabilityError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.top_p { obj.insert("top_p".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
            if let Some(s) = request.stop { obj.insert("stop".to_string(), json!(s)); }
        }

        let res = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::Generation(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(CapabilityError::Generation(format!(
                "{} chat error ({}): {}",
                self.name, status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| CapabilityError::Generation(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.to_string())
            .ok_or_else(|| {
                CapabilityError::Generation(format!("{} response contained no content", self.name))
            })
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let res = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::Embedding(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(CapabilityError::Embedding(format!(
                "{} embed error ({}): {}",
                self.name, status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| CapabilityError::Embedding(e.to_string()))?;

        // Items carry their input position; servers may answer out of order.
        let mut indexed: Vec<(usize, Vec<f32>)> = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for (position, item) in data.iter().enumerate() {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect();
                    let index = item["index"]
                        .as_u64()
                        .map(|i| i as usize)
                        .unwrap_or(position);
                    indexed.push((index, vec));
                }
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        let embeddings: Vec<Vec<f32>> = indexed.into_iter().map(|(_, vec)| vec).collect();

        if embeddings.len() != inputs.len() {
            return Err(CapabilityError::Embedding(format!(
                "{} returned {} embeddings for {} inputs",
                self.name,
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}
