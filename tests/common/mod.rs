//! Fake capabilities and a served app shared by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use code_tutor_backend::capability::CapabilityError;
use code_tutor_backend::core::config::{AppPaths, Settings};
use code_tutor_backend::execution::{
    CodeExecutor, ExecutionOutput, ExecutionResult, Language, OutputSink, OutputStream,
};
use code_tutor_backend::llm::{ChatRequest, LlmProvider};
use code_tutor_backend::rag::SqliteDocumentStore;
use code_tutor_backend::server::router::router;
use code_tutor_backend::state::{AppState, Capabilities};

pub const REPLY: &str = "Use print() to show output.";

/// Answers every chat with the same text after an optional delay, or fails.
/// Embeds every input onto the same axis.
pub struct FakeLlm {
    reply: Result<String, CapabilityError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(CapabilityError::Generation(message.to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::replying(REPLY)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply.clone()
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Echoes the code to stdout. Code starting with `sleep` blocks for a minute
/// first, standing in for a long-running program.
pub struct EchoExecutor;

#[async_trait]
impl CodeExecutor for EchoExecutor {
    async fn execute(
        &self,
        code: &str,
        _language: Language,
        output: Option<OutputSink>,
    ) -> ExecutionResult {
        if let Some(sink) = output {
            let _ = sink.send(ExecutionOutput {
                stream: OutputStream::Stdout,
                data: code.to_string(),
            });
        }
        if code.starts_with("sleep") {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        ExecutionResult::finished(code.to_string(), String::new(), 0, Duration::from_millis(5))
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn start(llm: Arc<FakeLlm>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_data_dir(
            dir.path().to_path_buf(),
            dir.path().join("data"),
        ));
        let documents = SqliteDocumentStore::open(paths.documents_db_path.clone())
            .await
            .unwrap();
        let llm: Arc<dyn LlmProvider> = llm;
        let state = AppState::assemble(
            paths,
            Settings::default(),
            Capabilities {
                llm: llm.clone(),
                embedder: llm,
                documents: Arc::new(documents),
                executor: Arc::new(EchoExecutor),
            },
        )
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/test-client", self.addr)
    }
}
