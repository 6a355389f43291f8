// Analyze Node
// First look at the code and its run, kept in the transcript

use async_trait::async_trait;

use crate::capability::CapabilityError;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutcome};
use crate::graph::prompts::analysis_messages;
use crate::graph::state::TutorState;
use crate::llm::ChatMessage;

pub struct AnalyzeCodeNode;

impl AnalyzeCodeNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnalyzeCodeNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for AnalyzeCodeNode {
    fn id(&self) -> &'static str {
        "analyze_code"
    }

    async fn execute(
        &self,
        state: &mut TutorState,
        ctx: &NodeContext,
    ) -> Result<NodeOutcome, GraphError> {
        let messages = analysis_messages(state.language(), state.code(), state.execution_result());

        match ctx.chat(messages).await {
            Ok(analysis) => {
                state.push_message(ChatMessage::assistant(analysis));
                Ok(NodeOutcome::Completed("Code analysis completed".to_string()))
            }
            Err(err) => Ok(NodeOutcome::Failed(err)),
        }
    }

    fn failure_label(&self, err: &CapabilityError) -> String {
        format!("Error in analysis: {}", err)
    }
}
