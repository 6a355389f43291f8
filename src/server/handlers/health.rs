use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Code tutor API is running" }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (rag_status, document_count) = match state.documents.count().await {
        Ok(count) => ("ready", Value::from(count)),
        Err(err) => {
            tracing::warn!("Document store unavailable: {}", err);
            ("unavailable", Value::Null)
        }
    };

    Json(json!({
        "status": "healthy",
        "services": {
            "code_executor": "ready",
            "rag_service": rag_status,
            "document_manager": "ready",
            "llm": state.llm.name(),
        },
        "document_count": document_count,
    }))
}
