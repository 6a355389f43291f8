use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{documents, execute, health, help};
use crate::server::ws::handler::ws_handler;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Creates the application router: REST endpoints, the tutor socket, CORS
/// and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    let upload_limit = state.settings.uploads.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route(
            "/upload-document",
            post(documents::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/execute", post(execute::execute_code))
        .route("/api/quick-help", post(help::quick_help))
        .route("/api/documents/stats", get(documents::stats))
        .route("/api/documents", delete(documents::delete_documents))
        .route("/ws/:client_id", get(ws_handler))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let mut allowed = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    if allowed.is_empty() {
        tracing::warn!("No usable CORS origins configured; using local defaults");
        allowed = default_local_origins()
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn default_local_origins() -> [&'static str; 2] {
    ["http://localhost:3000", "http://127.0.0.1:3000"]
}
