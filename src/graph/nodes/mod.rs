// Graph Nodes Module
// The four tutor stages

pub mod analyze;
pub mod explain;
pub mod format;
pub mod retrieve;

pub use analyze::AnalyzeCodeNode;
pub use explain::GenerateExplanationNode;
pub use format::FormatResponseNode;
pub use retrieve::RetrieveContextNode;
