// Format Node
// Marks the response as ready

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutcome};
use crate::graph::state::TutorState;

pub struct FormatResponseNode;

impl FormatResponseNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FormatResponseNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for FormatResponseNode {
    fn id(&self) -> &'static str {
        "format_response"
    }

    async fn execute(
        &self,
        _state: &mut TutorState,
        _ctx: &NodeContext,
    ) -> Result<NodeOutcome, GraphError> {
        Ok(NodeOutcome::Completed("Response formatted and ready".to_string()))
    }
}
