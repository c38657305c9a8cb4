use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::upload::validation::UploadRejection;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AnalysisUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internal causes are logged, not returned.
    pub fn detail(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::PayloadTooLarge(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            AppError::AnalysisUnavailable(_) => {
                "The code analysis service is unavailable. Please try again later.".to_string()
            }
            AppError::StorageUnavailable(_) => {
                "The review store is unavailable. Please try again later.".to_string()
            }
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => AppError::NotFound(e.to_string()),
            StoreError::Unavailable(msg) => AppError::StorageUnavailable(msg),
        }
    }
}

impl From<UploadRejection> for AppError {
    fn from(e: UploadRejection) -> Self {
        match e {
            UploadRejection::TooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
            _ => AppError::Validation(e.to_string()),
        }
    }
}

// Extractor rejections keep axum's message but use the JSON error body.

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        if e.status().is_server_error() {
            AppError::Internal(anyhow::anyhow!(e.body_text()))
        } else {
            AppError::Validation(e.body_text())
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("Request body too large.".to_string())
        } else {
            AppError::Validation(e.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = match &self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AnalysisUnavailable(msg) => {
                tracing::error!("Analysis error: {msg}");
                "ANALYSIS_UNAVAILABLE"
            }
            AppError::StorageUnavailable(msg) => {
                tracing::error!("Storage error: {msg}");
                "STORAGE_UNAVAILABLE"
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "INTERNAL_ERROR"
            }
        };

        let body = Json(json!({
            "detail": self.detail(),
            "code": code,
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_status() {
        assert_eq!(
            AppError::from(StoreError::NotFound(4)).status(),
            StatusCode::NOT_FOUND
        );
        let unavailable = AppError::from(StoreError::Unavailable("pool timed out".into()));
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!unavailable.detail().contains("pool"));
    }

    #[test]
    fn test_not_found_detail_names_the_id() {
        assert_eq!(
            AppError::from(StoreError::NotFound(4)).detail(),
            "Review with ID 4 not found"
        );
    }

    #[test]
    fn test_oversize_upload_is_413() {
        let err = AppError::from(UploadRejection::TooLarge { limit_kb: 200 });
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            AppError::from(UploadRejection::Empty).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
