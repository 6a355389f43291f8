use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::capability::CapabilityError;
use crate::execution::UnsupportedLanguage;
use crate::rag::ingest::IngestError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<UnsupportedLanguage> for ApiError {
    fn from(err: UnsupportedLanguage) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<CapabilityError> for ApiError {
    fn from(err: CapabilityError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedFileType(_)
            | IngestError::Empty(_)
            | IngestError::Extract { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            IngestError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            IngestError::Embedding(inner) => ApiError::Upstream(inner.to_string()),
            IngestError::Io(_) | IngestError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_maps_to_bad_request() {
        let err: ApiError = UnsupportedLanguage("ruby".to_string()).into();
        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg.contains("ruby")));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn capability_errors_surface_as_bad_gateway() {
        let err: ApiError = CapabilityError::Generation("quota exceeded".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn oversized_upload_maps_to_413() {
        let err: ApiError = IngestError::TooLarge {
            size: 20,
            limit: 10,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
