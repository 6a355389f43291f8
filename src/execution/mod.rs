//! Code execution: the result record consumed by the explanation pipeline
//! and the executor capability that produces it.

mod local;
mod types;

pub use local::LocalProcessExecutor;
pub use types::{
    ExecutionOutput, ExecutionResult, ExecutionStatus, Language, OutputStream, UnsupportedLanguage,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives stdout/stderr lines while a program is still running.
pub type OutputSink = mpsc::UnboundedSender<ExecutionOutput>;

/// Runs user code and reports how it went.
///
/// Failures are reported inside the returned [`ExecutionResult`] (status
/// `error` or `timeout`) rather than as an `Err`: a failed run is still a
/// result worth explaining.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        output: Option<OutputSink>,
    ) -> ExecutionResult;
}
