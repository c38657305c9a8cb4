use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::language::known_languages;
use crate::state::AppState;

/// GET /
/// Service name, version and the endpoint map.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Code Review Assistant API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "upload_multiple": "POST /api/upload-multiple",
            "supported_formats": "GET /api/supported-formats",
            "download_pdf": "GET /api/download-pdf/{filename}",
            "history": "GET /api/history",
            "review": "GET /api/history/{id}",
            "delete_review": "DELETE /api/history/{id}",
            "stats": "GET /api/history/stats/summary",
            "health": "GET /api/health"
        }
    }))
}

/// GET /ping
pub async fn ping_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Server running"
    }))
}

/// GET /api/health
/// Reports which analyzer backend is active and the languages it can label.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "code-review",
        "analyzer": state.service.analyzer_name(),
        "supported_languages": known_languages(),
    }))
}
