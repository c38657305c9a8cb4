pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::history::handlers as history;
use crate::state::AppState;
use crate::upload::handlers as upload;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = DefaultBodyLimit::max(state.config.body_limit_bytes());

    Router::new()
        .route("/", get(health::root_handler))
        .route("/ping", get(health::ping_handler))
        .route("/api/health", get(health::health_handler))
        // Review API
        .route("/api/upload", post(upload::handle_upload))
        .route("/api/upload-multiple", post(upload::handle_upload_multiple))
        .route("/api/supported-formats", get(upload::handle_supported_formats))
        .route("/api/download-pdf/:filename", get(upload::handle_download_pdf))
        // History API
        .route("/api/history", get(history::handle_list_history))
        .route("/api/history/", get(history::handle_list_history))
        .route("/api/history/stats/summary", get(history::handle_review_stats))
        .route(
            "/api/history/:id",
            get(history::handle_get_review).delete(history::handle_delete_review),
        )
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}
