use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::report::is_servable_report_name;
use crate::review::Review;
use crate::state::AppState;
use crate::upload::orchestrator::BatchEntry;
use crate::upload::validation::UploadedFile;

const SINGLE_FIELD: &str = "file";
const BATCH_FIELD: &str = "files";

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub export_pdf: bool,
}

#[derive(Debug, Serialize)]
pub struct SupportedFormats {
    pub supported_extensions: Vec<String>,
    pub max_file_size_kb: usize,
    pub max_files_per_request: usize,
}

/// POST /api/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    query: Result<Query<ExportQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Review>, AppError> {
    let Query(query) = query?;
    let file = read_files(multipart?, &[SINGLE_FIELD])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            AppError::Validation("No file uploaded. Send it in the 'file' form field.".to_string())
        })?;

    let review = state.service.review_upload(file, query.export_pdf).await?;
    Ok(Json(review))
}

/// POST /api/upload-multiple
pub async fn handle_upload_multiple(
    State(state): State<AppState>,
    query: Result<Query<ExportQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<BatchEntry>>, AppError> {
    let Query(query) = query?;
    let files = read_files(multipart?, &[BATCH_FIELD, SINGLE_FIELD]).await?;
    if files.is_empty() {
        return Err(AppError::Validation(
            "No files uploaded. Send them in the 'files' form field.".to_string(),
        ));
    }

    let entries = state.service.review_batch(files, query.export_pdf).await?;
    Ok(Json(entries))
}

/// GET /api/supported-formats
pub async fn handle_supported_formats(State(state): State<AppState>) -> Json<SupportedFormats> {
    let policy = state.service.policy();
    Json(SupportedFormats {
        supported_extensions: policy.supported_extensions.clone(),
        max_file_size_kb: policy.max_file_size_kb,
        max_files_per_request: policy.max_files_per_request,
    })
}

/// GET /api/download-pdf/:filename
pub async fn handle_download_pdf(
    State(state): State<AppState>,
    filename: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(filename) = filename?;
    let not_found = || AppError::NotFound("PDF report not found".to_string());
    if !is_servable_report_name(&filename) {
        return Err(not_found());
    }

    let path = state.config.reports_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            return Err(AppError::Internal(anyhow::anyhow!(
                "reading {}: {e}",
                path.display()
            )))
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

/// Collects every file part whose field name is in `accepted`, in order.
async fn read_files(
    mut multipart: Multipart,
    accepted: &[&str],
) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if !field.name().is_some_and(|name| accepted.contains(&name)) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile::new(filename, bytes));
    }
    Ok(files)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body too large.".to_string())
    } else {
        AppError::Validation(format!("Invalid multipart request: {}", e.body_text()))
    }
}
