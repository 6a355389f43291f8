// Explain Node
// Produces the tutor's explanation from the run and the references

use async_trait::async_trait;

use crate::capability::CapabilityError;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutcome};
use crate::graph::prompts::{reference_block, tutor_messages};
use crate::graph::state::TutorState;

pub struct GenerateExplanationNode;

impl GenerateExplanationNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenerateExplanationNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for GenerateExplanationNode {
    fn id(&self) -> &'static str {
        "generate_explanation"
    }

    async fn execute(
        &self,
        state: &mut TutorState,
        ctx: &NodeContext,
    ) -> Result<NodeOutcome, GraphError> {
        let references = reference_block(state.documents());
        let messages = tutor_messages(
            state.language(),
            state.code(),
            state.execution_result(),
            &references,
        );

        match ctx.chat(messages).await {
            Ok(explanation) => {
                state
                    .explanation
                    .set(explanation)
                    .map_err(|e| GraphError::slot_overwrite(self.id(), e))?;
                Ok(NodeOutcome::Completed("Explanation generated".to_string()))
            }
            Err(err) => Ok(NodeOutcome::Failed(err)),
        }
    }

    fn failure_label(&self, err: &CapabilityError) -> String {
        format!("Error: {}", err)
    }

    // The error text is streamed to the learner in place of an explanation.
    fn recover(&self, state: &mut TutorState, err: &CapabilityError) -> Result<(), GraphError> {
        state
            .explanation
            .set(format!("Error generating explanation: {}", err))
            .map_err(|e| GraphError::slot_overwrite(self.id(), e))
    }
}
