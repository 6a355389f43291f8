// Retrieve Node
// Looks up reference material for the code and its error output

use async_trait::async_trait;

use crate::capability::{with_deadline, CapabilityError};
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutcome};
use crate::graph::state::TutorState;
use crate::rag::{context_query, CONTEXT_LIMIT};

pub struct RetrieveContextNode;

impl RetrieveContextNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RetrieveContextNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for RetrieveContextNode {
    fn id(&self) -> &'static str {
        "retrieve_context"
    }

    async fn execute(
        &self,
        state: &mut TutorState,
        ctx: &NodeContext,
    ) -> Result<NodeOutcome, GraphError> {
        let query = context_query(
            state.language(),
            state.code(),
            &state.execution_result().stderr,
        );

        let found = with_deadline(
            "retrieval",
            ctx.stage_timeout,
            ctx.retriever.search(&query, CONTEXT_LIMIT),
        )
        .await;

        match found {
            Ok(documents) => {
                let count = documents.len();
                state
                    .retrieved_documents
                    .set(documents)
                    .map_err(|e| GraphError::slot_overwrite(self.id(), e))?;
                Ok(NodeOutcome::Completed(format!(
                    "Retrieved {} relevant documents",
                    count
                )))
            }
            Err(err) => Ok(NodeOutcome::Failed(err)),
        }
    }

    fn failure_label(&self, err: &CapabilityError) -> String {
        format!("Error retrieving context: {}", err)
    }

    fn recover(&self, state: &mut TutorState, _err: &CapabilityError) -> Result<(), GraphError> {
        state
            .retrieved_documents
            .set(Vec::new())
            .map_err(|e| GraphError::slot_overwrite(self.id(), e))
    }
}
