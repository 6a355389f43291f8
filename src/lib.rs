//! Code tutor backend: runs learner programs, then streams an explanation
//! built by a staged retrieval-augmented pipeline.

pub mod capability;
pub mod core;
pub mod execution;
pub mod graph;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod tutor;
