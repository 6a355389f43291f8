use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("Uploaded file has no name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?;

        let report = state
            .ingestor
            .ingest_upload(&file_name, &bytes)
            .await
            .map_err(|e| {
                tracing::error!("Error uploading document {}: {}", file_name, e);
                ApiError::from(e)
            })?;

        return Ok(Json(json!({
            "message": format!("Document {} uploaded and processed successfully", file_name),
            "chunks_created": report.chunks_created,
            "source": report.source,
        })));
    }

    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let count = state.documents.count().await.map_err(ApiError::internal)?;
    Ok(Json(json!({
        "document_count": count,
        "db_path": state.paths.documents_db_path.display().to_string(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub source: String,
}

/// Drops every chunk of one source, and the saved upload if it lives in the
/// upload dir.
pub async fn delete_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state
        .documents
        .delete_source(&query.source)
        .await
        .map_err(ApiError::internal)?;
    if deleted == 0 {
        return Err(ApiError::NotFound(format!(
            "No documents found for source {}",
            query.source
        )));
    }

    let path = Path::new(&query.source);
    if path.starts_with(&state.paths.upload_dir) && path.is_file() {
        if let Err(err) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to delete {}: {}", path.display(), err);
        }
    }

    tracing::info!("Deleted {} chunks from {}", deleted, query.source);
    Ok(Json(json!({ "deleted_chunks": deleted })))
}
