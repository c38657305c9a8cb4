//! Report Renderer: optional PDF export of a stored review.
//!
//! Rendering is synchronous and CPU-bound; the orchestrator runs it inside
//! `tokio::task::spawn_blocking` under its own timeout. A render failure never
//! fails the upload: it is recorded on the review as `pdf_error`.

pub mod font_metrics;
pub mod layout;
pub mod pdf;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::review::Review;

pub use pdf::PdfRenderer;

pub const DOWNLOAD_ROUTE_PREFIX: &str = "/api/download-pdf/";
const FALLBACK_STEM: &str = "review";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("review has not been stored yet")]
    MissingId,

    #[error("{0}")]
    Pdf(String),

    #[error("could not write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("render task failed: {0}")]
    Task(String),
}

impl RenderError {
    /// Message stored in the review's `pdf_error`.
    pub fn user_message(&self) -> String {
        format!("Failed to generate PDF report: {self}")
    }
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl RenderedReport {
    pub fn download_url(&self) -> String {
        format!("{DOWNLOAD_ROUTE_PREFIX}{}", self.file_name)
    }
}

pub trait ReportRenderer: Send + Sync {
    fn render(&self, review: &Review) -> Result<RenderedReport, RenderError>;

    /// Removes a report that finished after its render was already given up
    /// on, so it cannot be downloaded.
    fn discard(&self, _report: &RenderedReport) -> Result<(), RenderError> {
        Ok(())
    }
}

/// `<stem>_review_<id>.pdf`, with the stem reduced to `[A-Za-z0-9_-]`.
pub fn report_file_name(filename: &str, id: i64) -> String {
    let stem: String = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.trim_matches('_').is_empty() {
        FALLBACK_STEM
    } else {
        stem.as_str()
    };
    format!("{stem}_review_{id}.pdf")
}

/// Whether a requested download name can be served from the reports directory.
pub fn is_servable_report_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && name.to_ascii_lowercase().ends_with(".pdf")
}
