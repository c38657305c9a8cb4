//! Derived review values: score clamping, fallback scores and the generated summary.

use crate::review::models::{IssueBuckets, Severity};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// Score reported when the model output could not be interpreted at all.
pub const UNSET_SCORE: f64 = 0.0;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Clamps into [1, 10] and rounds to one decimal.
pub fn clamp_score(value: f64) -> f64 {
    round_to(value.clamp(MIN_SCORE, MAX_SCORE), 1)
}

/// Overall score used when the model did not provide one.
///
/// Starts at 10, deducts half of each issue's severity weight, and a further
/// 1.0 (more than 5 suggestions) or 0.5 (more than 3).
pub fn derived_overall_score(issues: &IssueBuckets, suggestions: usize) -> f64 {
    let mut score = MAX_SCORE;
    for issue in issues.iter() {
        score -= issue.severity.weight() * 0.5;
    }
    if suggestions > 5 {
        score -= 1.0;
    } else if suggestions > 3 {
        score -= 0.5;
    }
    clamp_score(score)
}

pub fn derived_complexity_score(issues: usize, suggestions: usize) -> f64 {
    clamp_score(MAX_SCORE - issues as f64 * 0.5 - suggestions as f64 * 0.2)
}

pub fn derived_maintainability_score(issues: usize, suggestions: usize) -> f64 {
    clamp_score(MAX_SCORE - issues as f64 * 0.3 - suggestions as f64 * 0.1)
}

fn quality_level(score: f64) -> &'static str {
    if score >= 8.0 {
        "excellent"
    } else if score >= 6.0 {
        "good"
    } else if score >= 4.0 {
        "fair"
    } else {
        "needs improvement"
    }
}

/// One-paragraph summary used when the model gave none.
pub fn generated_summary(score: f64, issues: &IssueBuckets, suggestions: usize) -> String {
    let mut parts = vec![format!(
        "Code quality is {} with an overall score of {score}/10.",
        quality_level(score)
    )];

    let total = issues.total();
    if total == 0 {
        parts.push("No issues were identified.".to_string());
    } else {
        let critical = issues.count(Severity::Critical);
        let high = issues.count(Severity::High);
        let minor = total - critical - high;

        let mut breakdown = Vec::new();
        if critical > 0 {
            breakdown.push(format!("{critical} critical"));
        }
        if high > 0 {
            breakdown.push(format!("{high} high"));
        }
        if minor > 0 {
            breakdown.push(format!("{minor} minor"));
        }
        parts.push(format!("Found {total} issues: {}.", breakdown.join(", ")));
    }

    if suggestions > 0 {
        parts.push(format!("Provided {suggestions} improvement suggestions."));
    }

    parts.join(" ")
}
