// Graph Builder
// Constructs the tutor pipeline using petgraph

use super::node::GraphError;
use super::nodes::{
    AnalyzeCodeNode, FormatResponseNode, GenerateExplanationNode, RetrieveContextNode,
};
use super::runtime::{GraphBuilder, GraphRuntime};

/// Build the explanation pipeline:
/// analyze_code -> retrieve_context -> generate_explanation -> format_response
pub fn build_tutor_graph() -> Result<GraphRuntime, GraphError> {
    GraphBuilder::new()
        .entry("analyze_code")
        .node(Box::new(AnalyzeCodeNode::new()))
        .node(Box::new(RetrieveContextNode::new()))
        .node(Box::new(GenerateExplanationNode::new()))
        .node(Box::new(FormatResponseNode::new()))
        // Retrieval reads nothing analysis writes; the order is kept for the
        // progress sequence clients expect.
        .edge("analyze_code", "retrieve_context")
        .edge("retrieve_context", "generate_explanation")
        .edge("generate_explanation", "format_response")
        .build()
}
