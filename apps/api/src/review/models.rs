use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

// ────────────────────────────────────────────────────────────────────────────
// Severity
// ────────────────────────────────────────────────────────────────────────────

/// The four severity buckets. Every issue lives in exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Bucket used for missing or unrecognized severities.
    pub const DEFAULT: Severity = Severity::Low;

    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Coerces free-form model output into a bucket.
    ///
    /// Exact names match case-insensitively, a few common synonyms are mapped,
    /// and anything else lands in [`Severity::DEFAULT`].
    pub fn coerce(raw: &str) -> Severity {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "blocker" | "fatal" => Severity::Critical,
            "high" | "major" | "error" => Severity::High,
            "medium" | "moderate" | "warning" => Severity::Medium,
            "low" | "minor" | "info" | "trivial" => Severity::Low,
            _ => Severity::DEFAULT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Score deduction weight used when the model omits an overall score.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 4.0,
            Severity::High => 3.0,
            Severity::Medium => 2.0,
            Severity::Low => 1.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Issue
// ────────────────────────────────────────────────────────────────────────────

/// One flagged problem in the reviewed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// 1-based line, `None` when the model gave no usable line.
    pub line_number: Option<u32>,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
    pub severity: Severity,
}

// ────────────────────────────────────────────────────────────────────────────
// IssueBuckets
// ────────────────────────────────────────────────────────────────────────────

/// Issues grouped by severity. The only way in is [`IssueBuckets::push`], which
/// routes by the issue's own severity, so buckets and severities cannot disagree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BucketsWire")]
pub struct IssueBuckets {
    critical: Vec<Issue>,
    high: Vec<Issue>,
    medium: Vec<Issue>,
    low: Vec<Issue>,
}

/// Deserialization shape. Re-bucketed on the way in.
#[derive(Deserialize)]
struct BucketsWire {
    #[serde(default)]
    critical: Vec<Issue>,
    #[serde(default)]
    high: Vec<Issue>,
    #[serde(default)]
    medium: Vec<Issue>,
    #[serde(default)]
    low: Vec<Issue>,
}

impl From<BucketsWire> for IssueBuckets {
    fn from(wire: BucketsWire) -> Self {
        wire.critical
            .into_iter()
            .chain(wire.high)
            .chain(wire.medium)
            .chain(wire.low)
            .collect()
    }
}

impl FromIterator<Issue> for IssueBuckets {
    fn from_iter<T: IntoIterator<Item = Issue>>(iter: T) -> Self {
        let mut buckets = IssueBuckets::default();
        for issue in iter {
            buckets.push(issue);
        }
        buckets
    }
}

impl IssueBuckets {
    pub fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Critical => self.critical.push(issue),
            Severity::High => self.high.push(issue),
            Severity::Medium => self.medium.push(issue),
            Severity::Low => self.low.push(issue),
        }
    }

    pub fn bucket(&self, severity: Severity) -> &[Issue] {
        match severity {
            Severity::Critical => &self.critical,
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.bucket(severity).len()
    }

    pub fn total(&self) -> usize {
        Severity::ALL.iter().map(|s| self.count(*s)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// All issues, most severe bucket first, insertion order within a bucket.
    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        Severity::ALL.into_iter().flat_map(move |s| self.bucket(s).iter())
    }

    /// Issue type → count.
    pub fn count_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for issue in self.iter() {
            *counts.entry(issue.issue_type.clone()).or_insert(0) += 1;
        }
        counts
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Review
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// 1 to 10, or 0 when the review could not be interpreted.
    pub complexity_score: f64,
    /// 1 to 10, or 0 when the review could not be interpreted.
    pub maintainability_score: f64,
}

/// The structured evaluation of one source file.
///
/// Severity counters are not fields: they are derived from `issues_by_severity`
/// whenever the review is serialized, and ignored when it is deserialized.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Review {
    /// Store id, attached once the review has been persisted.
    #[serde(default)]
    pub review_id: Option<i64>,
    pub filename: String,
    pub language: String,
    pub overall_score: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub readability: String,
    #[serde(default)]
    pub modularity: String,
    #[serde(default)]
    pub potential_bugs: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub issues_by_severity: IssueBuckets,
    #[serde(default)]
    pub quality_metrics: QualityMetrics,
    /// Megabytes, two decimals.
    #[serde(default)]
    pub file_size: f64,
    /// Seconds, two decimals.
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub pdf_report: Option<String>,
    #[serde(default)]
    pub pdf_error: Option<String>,
}

impl Review {
    pub fn total_issues(&self) -> usize {
        self.issues_by_severity.total()
    }

    pub fn critical_issues(&self) -> usize {
        self.issues_by_severity.count(Severity::Critical)
    }

    pub fn high_issues(&self) -> usize {
        self.issues_by_severity.count(Severity::High)
    }

    pub fn medium_issues(&self) -> usize {
        self.issues_by_severity.count(Severity::Medium)
    }

    pub fn low_issues(&self) -> usize {
        self.issues_by_severity.count(Severity::Low)
    }
}

/// Outward JSON shape of a [`Review`], including the derived fields.
#[derive(Serialize)]
struct ReviewWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    review_id: Option<i64>,
    filename: &'a str,
    language: &'a str,
    overall_score: f64,
    summary: &'a str,
    readability: &'a str,
    modularity: &'a str,
    potential_bugs: &'a str,
    suggestions: &'a [String],
    issues_by_severity: &'a IssueBuckets,
    issues_by_type: BTreeMap<String, usize>,
    quality_metrics: QualityMetricsWire<'a>,
    total_issues: usize,
    critical_issues: usize,
    high_issues: usize,
    medium_issues: usize,
    low_issues: usize,
    file_size: f64,
    processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_report: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_error: Option<&'a str>,
}

#[derive(Serialize)]
struct QualityMetricsWire<'a> {
    #[serde(flatten)]
    scores: &'a QualityMetrics,
    suggestions_count: usize,
    issues_per_suggestion: f64,
}

impl Serialize for Review {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let total = self.total_issues();
        let suggestions_count = self.suggestions.len();
        let issues_per_suggestion =
            crate::review::scoring::round_to(total as f64 / suggestions_count.max(1) as f64, 2);

        ReviewWire {
            review_id: self.review_id,
            filename: &self.filename,
            language: &self.language,
            overall_score: self.overall_score,
            summary: &self.summary,
            readability: &self.readability,
            modularity: &self.modularity,
            potential_bugs: &self.potential_bugs,
            suggestions: &self.suggestions,
            issues_by_severity: &self.issues_by_severity,
            issues_by_type: self.issues_by_severity.count_by_type(),
            quality_metrics: QualityMetricsWire {
                scores: &self.quality_metrics,
                suggestions_count,
                issues_per_suggestion,
            },
            total_issues: total,
            critical_issues: self.critical_issues(),
            high_issues: self.high_issues(),
            medium_issues: self.medium_issues(),
            low_issues: self.low_issues(),
            file_size: self.file_size,
            processing_time: self.processing_time,
            pdf_report: self.pdf_report.as_deref(),
            pdf_error: self.pdf_error.as_deref(),
        }
        .serialize(serializer)
    }
}
