// Deterministic fake capabilities shared by the pipeline tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::capability::CapabilityError;
use crate::llm::{ChatRequest, LlmProvider};
use crate::rag::{Document, Retriever};

/// Answers chat calls from a fixed script, in order.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, CapabilityError>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, CapabilityError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CapabilityError::Generation("script exhausted".to_string())))
    }
}

pub struct FakeRetriever {
    result: Result<Vec<Document>, CapabilityError>,
    calls: AtomicUsize,
    queries: Mutex<Vec<(String, usize)>>,
}

impl FakeRetriever {
    pub fn returning(documents: Vec<Document>) -> Self {
        Self::with_result(Ok(documents))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_result(Err(CapabilityError::Retrieval(message.to_string())))
    }

    fn with_result(result: Result<Vec<Document>, CapabilityError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push((query.to_string(), limit));
        self.result.clone()
    }
}
