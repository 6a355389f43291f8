//! Typed view of the merged configuration.
//!
//! Every section and field is optional in `config.yml`; missing values fall
//! back to the defaults below.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub rag: RagSettings,
    pub pipeline: PipelineSettings,
    pub execution: ExecutionSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: u64,
    /// Hold a lock around each completion call for providers that cannot
    /// take concurrent requests.
    pub serialize_calls: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".to_string(),
            model: "mixtral-8x7b-32768".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: None,
            request_timeout_secs: 60,
            serialize_calls: false,
        }
    }
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1234".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Deadline applied to each capability call inside a stage.
    pub stage_timeout_secs: Option<u64>,
}

impl PipelineSettings {
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub timeout_secs: u64,
    pub python_command: String,
    pub node_command: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            python_command: "python3".to_string(),
            node_command: "node".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub max_file_size: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}
