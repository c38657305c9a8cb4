use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use crate::models::review_record::{ReviewRecord, ReviewRecordRow, ReviewSummary};
use crate::review::Review;
use crate::store::{PageRequest, ReportOutcome, ReviewPage, ReviewStats, ReviewStore, StoreError};

const SUMMARY_COLUMNS: &str = "id, filename, language, overall_score, file_size, processing_time, \
     total_issues, critical_issues, high_issues, medium_issues, low_issues, created_at, updated_at";

/// PostgreSQL-backed store over the `review_records` table.
#[derive(Clone)]
pub struct PgReviewStore {
    pool: PgPool,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn create(&self, review: &Review) -> Result<i64, StoreError> {
        let language = Some(review.language.as_str()).filter(|l| !l.is_empty());

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO review_records
                (filename, language, overall_score, file_size, processing_time,
                 total_issues, critical_issues, high_issues, medium_issues, low_issues,
                 review_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&review.filename)
        .bind(language)
        .bind(review.overall_score)
        .bind(review.file_size)
        .bind(review.processing_time)
        .bind(review.total_issues() as i64)
        .bind(review.critical_issues() as i64)
        .bind(review.high_issues() as i64)
        .bind(review.medium_issues() as i64)
        .bind(review.low_issues() as i64)
        .bind(Json(review))
        .fetch_one(&self.pool)
        .await?;

        info!("Stored review {id} for {}", review.filename);
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<ReviewRecord, StoreError> {
        sqlx::query_as::<_, ReviewRecordRow>("SELECT * FROM review_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ReviewRecord::from)
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, page: PageRequest) -> Result<ReviewPage, StoreError> {
        let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review_records")
            .fetch_one(&self.pool)
            .await?;

        let reviews = sqlx::query_as::<_, ReviewSummary>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM review_records \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.page_size()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(ReviewPage {
            reviews,
            total_count,
        })
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM review_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!("Deleted review {id}");
        Ok(())
    }

    async fn summary(&self, recent_since: DateTime<Utc>) -> Result<ReviewStats, StoreError> {
        let (total_reviews, mean_score, total_issues, recent_reviews): (
            i64,
            Option<f64>,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   AVG(overall_score),
                   COALESCE(SUM(total_issues), 0)::BIGINT,
                   COUNT(*) FILTER (WHERE created_at >= $1)
            FROM review_records
            "#,
        )
        .bind(recent_since)
        .fetch_one(&self.pool)
        .await?;

        let languages: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT language, COUNT(*)
            FROM review_records
            WHERE language IS NOT NULL AND btrim(language) <> ''
            GROUP BY language
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ReviewStats::new(
            total_reviews,
            mean_score,
            total_issues,
            recent_reviews,
            languages.into_iter().collect::<BTreeMap<_, _>>(),
        ))
    }

    async fn record_report(&self, id: i64, outcome: &ReportOutcome) -> Result<(), StoreError> {
        let (pdf_report, pdf_error) = match outcome {
            ReportOutcome::Rendered { url } => (Some(url.as_str()), None),
            ReportOutcome::Failed { error } => (None, Some(error.as_str())),
        };

        let result = sqlx::query(
            r#"
            UPDATE review_records
            SET review_json = review_json || jsonb_build_object('pdf_report', $2::TEXT, 'pdf_error', $3::TEXT),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(pdf_report)
        .bind(pdf_error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
