// Node trait and types
// Base abstraction for pipeline stages

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::CapabilityError;
use crate::core::config::settings::LlmSettings;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::rag::Retriever;

use super::state::{AlreadySet, TutorState};

/// Capabilities injected into every stage.
#[derive(Clone)]
pub struct NodeContext {
    pub llm: Arc<dyn LlmProvider>,
    pub retriever: Arc<dyn Retriever>,
    pub llm_settings: LlmSettings,
    /// Deadline for each capability call; `None` waits indefinitely.
    pub stage_timeout: Option<Duration>,
}

impl NodeContext {
    pub fn new(llm: Arc<dyn LlmProvider>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            llm,
            retriever,
            llm_settings: LlmSettings::default(),
            stage_timeout: None,
        }
    }

    pub fn with_llm_settings(mut self, settings: LlmSettings) -> Self {
        self.llm_settings = settings;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// One completion under the configured sampling settings and deadline.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, CapabilityError> {
        let request = ChatRequest::new(messages).with_settings(&self.llm_settings);
        crate::capability::with_deadline("generation", self.stage_timeout, self.llm.chat(request))
            .await
    }
}

/// How a stage's capability call went. The runtime turns this into the
/// step label and, on failure, applies the stage's fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Success, with the step label to record.
    Completed(String),
    Failed(CapabilityError),
}

/// Engine-level error. Ends the stream.
///
/// Includes an optional `execution_trace` to record the sequence of node IDs
/// visited before the error occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphError {
    pub node_id: String,
    pub message: String,
    /// Ordered list of node IDs executed before this error, most-recent last.
    pub execution_trace: Vec<String>,
}

impl GraphError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            execution_trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: &[&str]) -> Self {
        self.execution_trace = trace.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn slot_overwrite(node_id: &str, err: AlreadySet) -> Self {
        Self::new(node_id, err.to_string())
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.execution_trace.is_empty() {
            write!(f, "GraphError in {}: {}", self.node_id, self.message)
        } else {
            write!(
                f,
                "GraphError in {} (trace: {}): {}",
                self.node_id,
                self.execution_trace.join(" -> "),
                self.message
            )
        }
    }
}

impl std::error::Error for GraphError {}

/// Node trait - every pipeline stage implements this
#[async_trait]
pub trait Node: Send + Sync {
    /// Stage name, also used in progress chunks
    fn id(&self) -> &'static str;

    /// Run the stage. Capability failures come back as
    /// [`NodeOutcome::Failed`]; `Err` is reserved for engine-level faults.
    async fn execute(
        &self,
        state: &mut TutorState,
        ctx: &NodeContext,
    ) -> Result<NodeOutcome, GraphError>;

    /// Step label recorded when the capability call failed.
    fn failure_label(&self, err: &CapabilityError) -> String {
        format!("Error in {}: {}", self.id(), err)
    }

    /// Fallback applied to the state after a failed capability call.
    fn recover(&self, _state: &mut TutorState, _err: &CapabilityError) -> Result<(), GraphError> {
        Ok(())
    }
}
