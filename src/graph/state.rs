// Tutor State
// The record threaded through every pipeline stage

use thiserror::Error;

use crate::execution::{ExecutionResult, Language};
use crate::llm::ChatMessage;
use crate::rag::Document;

pub const INITIAL_STEP: &str = "Starting analysis...";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} has already been set")]
pub struct AlreadySet {
    pub field: &'static str,
}

/// A value that is "not yet computed" until its stage fills it, and can be
/// filled only once.
#[derive(Debug, Clone)]
pub struct Slot<T> {
    field: &'static str,
    value: Option<T>,
}

impl<T> Slot<T> {
    pub fn pending(field: &'static str) -> Self {
        Self { field, value: None }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn set(&mut self, value: T) -> Result<(), AlreadySet> {
        if self.value.is_some() {
            return Err(AlreadySet { field: self.field });
        }
        self.value = Some(value);
        Ok(())
    }
}

/// One explanation request. Inputs are fixed at construction; stage outputs
/// go into write-once slots; the transcript only grows.
#[derive(Debug, Clone)]
pub struct TutorState {
    code: String,
    language: Language,
    execution_result: ExecutionResult,
    pub retrieved_documents: Slot<Vec<Document>>,
    pub explanation: Slot<String>,
    current_step: String,
    messages: Vec<ChatMessage>,
}

impl TutorState {
    pub fn new(code: impl Into<String>, language: Language, execution_result: ExecutionResult) -> Self {
        Self {
            code: code.into(),
            language,
            execution_result,
            retrieved_documents: Slot::pending("retrieved_documents"),
            explanation: Slot::pending("explanation"),
            current_step: INITIAL_STEP.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn execution_result(&self) -> &ExecutionResult {
        &self.execution_result
    }

    pub fn current_step(&self) -> &str {
        &self.current_step
    }

    /// Only the runtime moves the step label, once per finished stage.
    pub(crate) fn set_current_step(&mut self, label: String) {
        self.current_step = label;
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Retrieved documents, or none if retrieval has not run.
    pub fn documents(&self) -> &[Document] {
        self.retrieved_documents
            .get()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state() -> TutorState {
        TutorState::new(
            "print(1)",
            Language::Python,
            ExecutionResult::finished("1\n".to_string(), String::new(), 0, Duration::from_millis(5)),
        )
    }

    #[test]
    fn new_state_starts_pending() {
        let state = state();
        assert_eq!(state.current_step(), "Starting analysis...");
        assert!(!state.retrieved_documents.is_set());
        assert!(!state.explanation.is_set());
        assert!(state.documents().is_empty());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn slots_accept_exactly_one_write() {
        let mut state = state();
        state.explanation.set("first".to_string()).unwrap();

        let err = state.explanation.set("second".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "explanation has already been set");
        assert_eq!(state.explanation.get().map(String::as_str), Some("first"));
    }
}
