use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::review::Review;

/// A stored review without its payload, as listed in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReviewSummary {
    pub id: i64,
    pub filename: String,
    pub language: Option<String>,
    pub overall_score: f64,
    pub file_size: Option<f64>,
    pub processing_time: Option<f64>,
    pub total_issues: i64,
    pub critical_issues: i64,
    pub high_issues: i64,
    pub medium_issues: i64,
    pub low_issues: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewSummary {
    /// Builds the denormalized columns of a review about to be stored.
    pub fn from_review(id: i64, review: &Review, at: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: review.filename.clone(),
            language: Some(review.language.clone()).filter(|l| !l.is_empty()),
            overall_score: review.overall_score,
            file_size: Some(review.file_size),
            processing_time: Some(review.processing_time),
            total_issues: review.total_issues() as i64,
            critical_issues: review.critical_issues() as i64,
            high_issues: review.high_issues() as i64,
            medium_issues: review.medium_issues() as i64,
            low_issues: review.low_issues() as i64,
            created_at: at,
            updated_at: at,
        }
    }
}

/// A stored review: the summary columns plus the full review payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRecord {
    #[serde(flatten)]
    pub summary: ReviewSummary,
    pub review_json: Review,
}

/// Row shape of `review_records` as read by the Postgres store.
#[derive(Debug, FromRow)]
pub struct ReviewRecordRow {
    pub id: i64,
    pub filename: String,
    pub language: Option<String>,
    pub overall_score: f64,
    pub file_size: Option<f64>,
    pub processing_time: Option<f64>,
    pub total_issues: i64,
    pub critical_issues: i64,
    pub high_issues: i64,
    pub medium_issues: i64,
    pub low_issues: i64,
    pub review_json: Json<Review>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReviewRecordRow> for ReviewRecord {
    fn from(row: ReviewRecordRow) -> Self {
        let mut review = row.review_json.0;
        review.review_id = Some(row.id);
        ReviewRecord {
            summary: ReviewSummary {
                id: row.id,
                filename: row.filename,
                language: row.language,
                overall_score: row.overall_score,
                file_size: row.file_size,
                processing_time: row.processing_time,
                total_issues: row.total_issues,
                critical_issues: row.critical_issues,
                high_issues: row.high_issues,
                medium_issues: row.medium_issues,
                low_issues: row.low_issues,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            review_json: review,
        }
    }
}
