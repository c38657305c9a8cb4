//! Review Store: the only owner of persisted review records.
//!
//! `AppState` and the upload orchestrator hold an `Arc<dyn ReviewStore>`,
//! chosen at startup: `PgReviewStore` when `DATABASE_URL` is set,
//! `MemoryReviewStore` otherwise.

pub mod memory;
pub mod postgres;
pub mod stats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::review_record::{ReviewRecord, ReviewSummary};
use crate::review::Review;

pub use memory::MemoryReviewStore;
pub use postgres::PgReviewStore;
pub use stats::ReviewStats;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Review with ID {0} not found")]
    NotFound(i64),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// A validated page request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Returns `None` unless `page >= 1` and `1 <= page_size <= MAX_PAGE_SIZE`.
    pub fn new(page: u32, page_size: u32) -> Option<Self> {
        if page == 0 || page_size == 0 || page_size > MAX_PAGE_SIZE {
            return None;
        }
        Some(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPage {
    pub reviews: Vec<ReviewSummary>,
    pub total_count: i64,
}

/// Result of the optional report render, recorded on the stored payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Rendered { url: String },
    Failed { error: String },
}

impl ReportOutcome {
    pub fn apply(&self, review: &mut Review) {
        match self {
            ReportOutcome::Rendered { url } => {
                review.pdf_report = Some(url.clone());
                review.pdf_error = None;
            }
            ReportOutcome::Failed { error } => {
                review.pdf_report = None;
                review.pdf_error = Some(error.clone());
            }
        }
    }
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Persists a review and returns its new id. Never reuses an id.
    async fn create(&self, review: &Review) -> Result<i64, StoreError>;

    async fn get(&self, id: i64) -> Result<ReviewRecord, StoreError>;

    /// Ordered by `created_at` descending, ties broken by `id` descending.
    async fn list(&self, page: PageRequest) -> Result<ReviewPage, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Aggregates over all records; `recent_since` bounds `recent_reviews`.
    async fn summary(&self, recent_since: DateTime<Utc>) -> Result<ReviewStats, StoreError>;

    /// Writes the report outcome into the stored payload and bumps `updated_at`.
    async fn record_report(&self, id: i64, outcome: &ReportOutcome) -> Result<(), StoreError>;
}
