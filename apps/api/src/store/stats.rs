use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::review_record::ReviewSummary;
use crate::review::scoring::round_to;

/// Trailing window counted as "recent" on the dashboard.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Aggregate statistics over every stored review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total_reviews: i64,
    /// Mean overall score, two decimals; 0 when there are no reviews.
    pub average_score: f64,
    pub total_issues: i64,
    pub recent_reviews: i64,
    pub languages: BTreeMap<String, i64>,
}

impl ReviewStats {
    /// Start of the recent window relative to `now`.
    pub fn recent_since(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(RECENT_WINDOW_DAYS)
    }

    /// Finishes aggregates computed elsewhere (e.g. in SQL).
    pub fn new(
        total_reviews: i64,
        mean_score: Option<f64>,
        total_issues: i64,
        recent_reviews: i64,
        languages: BTreeMap<String, i64>,
    ) -> Self {
        let average_score = match mean_score {
            Some(mean) if total_reviews > 0 && mean.is_finite() => round_to(mean, 2),
            _ => 0.0,
        };
        Self {
            total_reviews,
            average_score,
            total_issues,
            recent_reviews,
            languages,
        }
    }

    /// Folds summaries in memory. Blank or missing languages are not counted.
    pub fn from_summaries<'a>(
        summaries: impl IntoIterator<Item = &'a ReviewSummary>,
        recent_since: DateTime<Utc>,
    ) -> Self {
        let mut total_reviews = 0_i64;
        let mut score_sum = 0.0_f64;
        let mut total_issues = 0_i64;
        let mut recent_reviews = 0_i64;
        let mut languages = BTreeMap::new();

        for summary in summaries {
            total_reviews += 1;
            score_sum += summary.overall_score;
            total_issues += summary.total_issues;
            if summary.created_at >= recent_since {
                recent_reviews += 1;
            }
            if let Some(language) = summary.language.as_deref().filter(|l| !l.trim().is_empty()) {
                *languages.entry(language.to_string()).or_insert(0) += 1;
            }
        }

        let mean = (total_reviews > 0).then(|| score_sum / total_reviews as f64);
        Self::new(total_reviews, mean, total_issues, recent_reviews, languages)
    }
}
