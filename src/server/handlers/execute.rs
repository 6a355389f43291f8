use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::execution::{ExecutionResult, Language, UnsupportedLanguage};
use crate::state::AppState;

/// `{code, language}` as sent by the editor, over HTTP and the socket.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeRequest {
    pub code: String,
    pub language: String,
}

impl CodeRequest {
    pub fn language(&self) -> Result<Language, UnsupportedLanguage> {
        self.language.parse()
    }
}

pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let language = request.language()?;
    let result = state.executor.execute(&request.code, language, None).await;
    Ok(Json(result))
}
