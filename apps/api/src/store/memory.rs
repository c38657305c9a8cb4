//! In-process review store used when no database is configured.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::review_record::{ReviewRecord, ReviewSummary};
use crate::review::Review;
use crate::store::{PageRequest, ReportOutcome, ReviewPage, ReviewStats, ReviewStore, StoreError};

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<i64, ReviewRecord>,
}

/// Records live for the life of the process. All writes take the lock, so
/// creates get distinct ids and delete/read races resolve in lock order.
#[derive(Default)]
pub struct MemoryReviewStore {
    inner: RwLock<Inner>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts with an explicit creation time.
    pub async fn create_at(&self, review: &Review, at: DateTime<Utc>) -> i64 {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;

        let mut payload = review.clone();
        payload.review_id = Some(id);
        let record = ReviewRecord {
            summary: ReviewSummary::from_review(id, review, at),
            review_json: payload,
        };
        inner.records.insert(id, record);
        id
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn create(&self, review: &Review) -> Result<i64, StoreError> {
        Ok(self.create_at(review, Utc::now()).await)
    }

    async fn get(&self, id: i64) -> Result<ReviewRecord, StoreError> {
        self.inner
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, page: PageRequest) -> Result<ReviewPage, StoreError> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<&ReviewSummary> =
            inner.records.values().map(|r| &r.summary).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let reviews = summaries
            .into_iter()
            .skip(offset)
            .take(page.page_size() as usize)
            .cloned()
            .collect();

        Ok(ReviewPage {
            reviews,
            total_count: inner.records.len() as i64,
        })
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn summary(&self, recent_since: DateTime<Utc>) -> Result<ReviewStats, StoreError> {
        let inner = self.inner.read().await;
        Ok(ReviewStats::from_summaries(
            inner.records.values().map(|r| &r.summary),
            recent_since,
        ))
    }

    async fn record_report(&self, id: i64, outcome: &ReportOutcome) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        outcome.apply(&mut record.review_json);
        record.summary.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::models::{Issue, Severity};
    use chrono::{Duration, TimeZone};

    fn review(filename: &str, score: f64, severities: &[Severity]) -> Review {
        Review {
            filename: filename.to_string(),
            language: "Python".to_string(),
            overall_score: score,
            issues_by_severity: severities
                .iter()
                .map(|s| Issue {
                    line_number: Some(1),
                    issue_type: "bug".to_string(),
                    description: "d".to_string(),
                    suggestion: String::new(),
                    severity: *s,
                })
                .collect(),
            file_size: 0.01,
            processing_time: 0.5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips_counts_and_score() {
        let store = MemoryReviewStore::new();
        let input = review(
            "a.py",
            6.5,
            &[Severity::Critical, Severity::Medium, Severity::Medium],
        );
        let id = store.create(&input).await.unwrap();
        let record = store.get(id).await.unwrap();

        assert_eq!(record.summary.id, id);
        assert_eq!(record.summary.overall_score.to_bits(), input.overall_score.to_bits());
        assert_eq!(record.summary.total_issues, 3);
        assert_eq!(record.summary.critical_issues, 1);
        assert_eq!(record.summary.medium_issues, 2);
        assert_eq!(record.review_json.total_issues(), input.total_issues());
        assert_eq!(record.review_json.critical_issues(), input.critical_issues());
        assert_eq!(record.review_json.review_id, Some(id));
    }

    #[tokio::test]
    async fn test_create_assigns_distinct_increasing_ids() {
        let store = MemoryReviewStore::new();
        let a = store.create(&review("a.py", 5.0, &[])).await.unwrap();
        let b = store.create(&review("b.py", 5.0, &[])).await.unwrap();
        assert!(b > a);
        store.delete(b).await.unwrap();
        let c = store.create(&review("c.py", 5.0, &[])).await.unwrap();
        assert!(c > b, "ids are never reused");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryReviewStore::new();
        assert!(matches!(store.get(7).await, Err(StoreError::NotFound(7))));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let store = MemoryReviewStore::new();
        let id = store.create(&review("a.py", 5.0, &[])).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_pages_cover_every_record_once_newest_first() {
        let store = MemoryReviewStore::new();
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        // Two records share a timestamp so the id tie-break is exercised.
        let mut expected = Vec::new();
        for i in 0..7 {
            let at = base + Duration::minutes((i / 2) as i64);
            expected.push(store.create_at(&review(&format!("f{i}.py"), 5.0, &[]), at).await);
        }
        expected.reverse();

        let mut seen = Vec::new();
        for page in 1..=3 {
            let result = store.list(PageRequest::new(page, 3).unwrap()).await.unwrap();
            assert_eq!(result.total_count, 7);
            seen.extend(result.reviews.iter().map(|r| r.id));
        }
        assert_eq!(seen, expected);

        let beyond = store.list(PageRequest::new(4, 3).unwrap()).await.unwrap();
        assert!(beyond.reviews.is_empty());
    }

    #[tokio::test]
    async fn test_summary_counts_recent_window() {
        let store = MemoryReviewStore::new();
        let now = Utc::now();
        store.create_at(&review("old.py", 4.0, &[Severity::Low]), now - Duration::days(30)).await;
        store
            .create_at(&review("new.py", 8.0, &[Severity::High, Severity::Low]), now)
            .await;

        let stats = store.summary(ReviewStats::recent_since(now)).await.unwrap();
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.recent_reviews, 1);
        assert_eq!(stats.total_issues, 3);
        assert_eq!(stats.average_score, 6.0);
        assert_eq!(stats.languages.get("Python"), Some(&2));
    }

    #[tokio::test]
    async fn test_record_report_updates_payload_and_timestamp() {
        let store = MemoryReviewStore::new();
        let created = Utc::now() - Duration::hours(1);
        let id = store.create_at(&review("a.py", 5.0, &[]), created).await;

        store
            .record_report(
                id,
                &ReportOutcome::Failed {
                    error: "Failed to generate PDF report".to_string(),
                },
            )
            .await
            .unwrap();

        let record = store.get(id).await.unwrap();
        assert_eq!(
            record.review_json.pdf_error.as_deref(),
            Some("Failed to generate PDF report")
        );
        assert_eq!(record.summary.created_at, created);
        assert!(record.summary.updated_at > created);
    }
}
