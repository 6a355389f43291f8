// Tutor Graph Module
// Staged explanation pipeline on a petgraph stage chain

pub mod builder;
pub mod node;
pub mod nodes;
pub mod prompts;
pub mod runtime;
pub mod state;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::build_tutor_graph;
pub use node::{GraphError, Node, NodeContext, NodeOutcome};
pub use runtime::{GraphBuilder, GraphRuntime};
pub use state::{Slot, TutorState};
pub use stream::{ChunkKind, StreamChunk};
