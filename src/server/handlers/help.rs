use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::execute::CodeRequest;
use crate::core::errors::ApiError;
use crate::state::AppState;

/// Quick help text, or the failure rendered as help text.
pub async fn help_text(state: &AppState, request: &CodeRequest) -> Result<String, ApiError> {
    let language = request.language()?;
    match state.tutor.quick_help(&request.code, language).await {
        Ok(help) => Ok(help),
        Err(err) => {
            tracing::error!("Error getting quick help: {}", err);
            Ok(format!("Error getting help: {}", err))
        }
    }
}

pub async fn quick_help(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<Value>, ApiError> {
    let help = help_text(&state, &request).await?;
    Ok(Json(json!({ "help": help })))
}
