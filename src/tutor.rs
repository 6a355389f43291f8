//! Entry point for explanations: owns the built pipeline and the injected
//! capabilities, and serves the one-shot quick-help call.

use std::sync::Arc;

use futures_util::stream::BoxStream;

use crate::capability::CapabilityError;
use crate::execution::{ExecutionResult, Language};
use crate::graph::prompts::quick_help_messages;
use crate::graph::{build_tutor_graph, GraphError, GraphRuntime, NodeContext, StreamChunk, TutorState};

#[derive(Clone)]
pub struct CodeTutor {
    graph: Arc<GraphRuntime>,
    ctx: NodeContext,
}

impl CodeTutor {
    pub fn new(ctx: NodeContext) -> Result<Self, GraphError> {
        let graph = Arc::new(build_tutor_graph()?);
        tracing::info!("Tutor pipeline ready: {}", graph.stage_ids().join(" -> "));
        Ok(Self { graph, ctx })
    }

    /// Streams a staged explanation of a finished run. Each call gets fresh
    /// state; nothing runs until the stream is polled.
    pub fn explain(
        &self,
        code: &str,
        language: Language,
        execution_result: ExecutionResult,
    ) -> BoxStream<'static, StreamChunk> {
        let state = TutorState::new(code, language, execution_result);
        self.graph.clone().stream(state, self.ctx.clone())
    }

    /// Single non-streaming completion with a short help prompt. Shares the
    /// model but none of the pipeline state.
    pub async fn quick_help(&self, code: &str, language: Language) -> Result<String, CapabilityError> {
        self.ctx.chat(quick_help_messages(language, code)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::StreamExt;

    use crate::graph::testing::{FakeRetriever, ScriptedLlm};

    #[tokio::test]
    async fn each_explanation_starts_from_fresh_state() {
        let llm = Arc::new(ScriptedLlm::replying(&["a1", "first", "a2", "second"]));
        let retriever = Arc::new(FakeRetriever::returning(Vec::new()));
        let tutor = CodeTutor::new(NodeContext::new(llm.clone(), retriever)).unwrap();
        let result = ExecutionResult::finished("ok\n".to_string(), String::new(), 0, Duration::ZERO);

        let first: Vec<StreamChunk> = tutor
            .explain("print(1)", Language::Python, result.clone())
            .collect()
            .await;
        let second: Vec<StreamChunk> = tutor
            .explain("print(1)", Language::Python, result)
            .collect()
            .await;

        assert_eq!(first[3], StreamChunk::Explanation("first".to_string()));
        assert_eq!(second[3], StreamChunk::Explanation("second".to_string()));
        assert_eq!(llm.calls(), 4);
    }

    #[tokio::test]
    async fn explain_is_lazy_until_polled() {
        let llm = Arc::new(ScriptedLlm::replying(&["a", "b"]));
        let retriever = Arc::new(FakeRetriever::returning(Vec::new()));
        let tutor = CodeTutor::new(NodeContext::new(llm.clone(), retriever.clone())).unwrap();

        let stream = tutor.explain(
            "1/0",
            Language::Javascript,
            ExecutionResult::failed_to_run("boom", Duration::ZERO),
        );
        drop(stream);

        assert_eq!(llm.calls(), 0);
        assert_eq!(retriever.calls(), 0);
    }

    #[tokio::test]
    async fn quick_help_is_one_plain_completion() {
        let llm = Arc::new(ScriptedLlm::replying(&["Use a list comprehension."]));
        let retriever = Arc::new(FakeRetriever::returning(Vec::new()));
        let tutor = CodeTutor::new(NodeContext::new(llm.clone(), retriever.clone())).unwrap();

        let help = tutor.quick_help("xs = []", Language::Python).await.unwrap();

        assert_eq!(help, "Use a list comprehension.");
        assert_eq!(llm.calls(), 1);
        assert_eq!(retriever.calls(), 0);
        let request = &llm.requests()[0];
        assert!(request.messages[1]
            .content
            .ends_with("```python\nxs = []\n```\n\nProvide quick help or suggestions."));
        assert_eq!(request.temperature, Some(0.1));
    }

    #[tokio::test]
    async fn quick_help_failure_is_returned_to_the_caller() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(CapabilityError::Generation(
            "no key".to_string(),
        ))]));
        let retriever = Arc::new(FakeRetriever::returning(Vec::new()));
        let tutor = CodeTutor::new(NodeContext::new(llm, retriever)).unwrap();

        let err = tutor.quick_help("x", Language::Python).await.unwrap_err();
        assert_eq!(err.to_string(), "no key");
    }
}
