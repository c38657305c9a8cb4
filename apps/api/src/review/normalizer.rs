//! Review Normalizer: coerces raw model output into a [`Review`].
//!
//! `normalize` is total: any input, including empty or truncated text, yields a
//! valid review. Each field is decoded into a [`Field`] that records whether the
//! value came from the model or was defaulted, and the defaulted names are
//! returned alongside the review in [`Provenance`].
//!
//! Output that is not a JSON object after fence stripping and brace extraction
//! is treated as unparseable as a whole. There is no partial recovery of
//! truncated JSON.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::review::models::{Issue, IssueBuckets, QualityMetrics, Review, Severity};
use crate::review::scoring::{
    clamp_score, derived_complexity_score, derived_maintainability_score, derived_overall_score,
    generated_summary, UNSET_SCORE,
};

/// Summary used when the model output could not be interpreted at all.
pub const FALLBACK_SUMMARY: &str = "The automated review could not be completed: the model \
    response could not be interpreted as a structured review. Please try again.";

const DEFAULT_ISSUE_TYPE: &str = "general";

/// Request-scoped values the model does not provide.
#[derive(Debug, Clone)]
pub struct ReviewContext<'a> {
    pub filename: &'a str,
    pub language: &'a str,
    /// Megabytes.
    pub file_size: f64,
    /// Seconds.
    pub processing_time: f64,
}

/// How a review was obtained from the raw output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Provenance {
    Parsed {
        /// Fields that were absent or unusable and got a default.
        defaulted: Vec<&'static str>,
        /// Issue entries that were neither objects nor strings.
        skipped_issues: usize,
    },
    Unparseable { reason: String },
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub review: Review,
    pub provenance: Provenance,
}

/// A decoded value tagged with where it came from.
enum Field<T> {
    Present(T),
    Defaulted(T),
}

impl<T> Field<T> {
    fn record(self, name: &'static str, defaulted: &mut Vec<&'static str>) -> T {
        match self {
            Field::Present(value) => value,
            Field::Defaulted(value) => {
                defaulted.push(name);
                value
            }
        }
    }

    fn present(self) -> Option<T> {
        match self {
            Field::Present(value) => Some(value),
            Field::Defaulted(_) => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

pub fn normalize(raw: &str, context: &ReviewContext<'_>) -> Normalized {
    let object = match extract_object(raw) {
        Ok(object) => object,
        Err(reason) => {
            debug!(filename = context.filename, %reason, "model output unparseable");
            return Normalized {
                review: fallback_review(context),
                provenance: Provenance::Unparseable { reason },
            };
        }
    };

    let mut defaulted = Vec::new();

    let suggestions = decode_suggestions(&object).record("suggestions", &mut defaulted);
    let (issues, skipped_issues) = decode_issues(&object).record("issues", &mut defaulted);
    let issue_count = issues.total();

    let overall_score = match decode_score(object.get("overall_score")) {
        Some(score) => score,
        None => {
            defaulted.push("overall_score");
            derived_overall_score(&issues, suggestions.len())
        }
    };

    let summary = decode_text(&object, &["summary"])
        .present()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| {
            defaulted.push("summary");
            generated_summary(overall_score, &issues, suggestions.len())
        });

    let metrics = object.get("quality_metrics").and_then(Value::as_object);
    let complexity_score = match decode_score(metrics.and_then(|m| m.get("complexity_score"))) {
        Some(score) => score,
        None => {
            defaulted.push("quality_metrics.complexity_score");
            derived_complexity_score(issue_count, suggestions.len())
        }
    };
    let maintainability_score =
        match decode_score(metrics.and_then(|m| m.get("maintainability_score"))) {
            Some(score) => score,
            None => {
                defaulted.push("quality_metrics.maintainability_score");
                derived_maintainability_score(issue_count, suggestions.len())
            }
        };

    let review = Review {
        review_id: None,
        filename: context.filename.to_string(),
        language: context.language.to_string(),
        overall_score,
        summary,
        readability: decode_text(&object, &["readability"]).record("readability", &mut defaulted),
        modularity: decode_text(&object, &["modularity"]).record("modularity", &mut defaulted),
        potential_bugs: decode_text(&object, &["potential_bugs", "bugs"])
            .record("potential_bugs", &mut defaulted),
        suggestions,
        issues_by_severity: issues,
        quality_metrics: QualityMetrics {
            complexity_score,
            maintainability_score,
        },
        file_size: context.file_size,
        processing_time: context.processing_time,
        pdf_report: None,
        pdf_error: None,
    };

    if !defaulted.is_empty() || skipped_issues > 0 {
        debug!(
            filename = context.filename,
            ?defaulted,
            skipped_issues,
            "model output partially defaulted"
        );
    }

    Normalized {
        review,
        provenance: Provenance::Parsed {
            defaulted,
            skipped_issues,
        },
    }
}

fn fallback_review(context: &ReviewContext<'_>) -> Review {
    Review {
        review_id: None,
        filename: context.filename.to_string(),
        language: context.language.to_string(),
        overall_score: UNSET_SCORE,
        summary: FALLBACK_SUMMARY.to_string(),
        quality_metrics: QualityMetrics {
            complexity_score: UNSET_SCORE,
            maintainability_score: UNSET_SCORE,
        },
        file_size: context.file_size,
        processing_time: context.processing_time,
        ..Default::default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON extraction
// ────────────────────────────────────────────────────────────────────────────

/// Finds the JSON object in raw model text.
///
/// Tries the fence-stripped text first, then the span from the first `{` to the
/// last `}` (models like to wrap JSON in prose).
fn extract_object(raw: &str) -> Result<Map<String, Value>, String> {
    let text = strip_json_fences(raw);
    if text.is_empty() {
        return Err("empty model output".to_string());
    }

    let parsed = serde_json::from_str::<Value>(text).or_else(|first_err| {
        match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<Value>(&text[start..=end]).map_err(|e| e.to_string())
            }
            _ => Err(first_err.to_string()),
        }
    })?;

    match parsed {
        Value::Object(object) => Ok(object),
        other => Err(format!("expected a JSON object, got {}", json_kind(&other))),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field decoders
// ────────────────────────────────────────────────────────────────────────────

/// Number or numeric string (`"7.5"`, `"8/10"`), clamped and rounded.
fn decode_score(value: Option<&Value>) -> Option<f64> {
    value.and_then(number_of).map(clamp_score)
}

fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.split('/').next().and_then(|s| s.trim().parse::<f64>().ok()),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// String, or an array of strings joined with a space.
fn decode_text(object: &Map<String, Value>, keys: &[&str]) -> Field<String> {
    match first_present(object, keys) {
        Some(Value::String(s)) => Field::Present(s.trim().to_string()),
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                Field::Defaulted(String::new())
            } else {
                Field::Present(parts.join(" "))
            }
        }
        _ => Field::Defaulted(String::new()),
    }
}

fn decode_suggestions(object: &Map<String, Value>) -> Field<Vec<String>> {
    let items: Vec<String> = match object.get("suggestions") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) => vec![s.trim().to_string()],
        _ => return Field::Defaulted(Vec::new()),
    };
    Field::Present(items.into_iter().filter(|s| !s.is_empty()).collect())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decodes issues from `issues`, `line_wise_issues`, or the grouped
/// `issues_by_severity` form. Returns the buckets and the skipped-entry count.
fn decode_issues(object: &Map<String, Value>) -> Field<(IssueBuckets, usize)> {
    let source = ["issues", "line_wise_issues", "issues_by_severity"]
        .iter()
        .filter_map(|key| object.get(*key))
        .find(|value| value.is_array() || value.is_object());

    let mut buckets = IssueBuckets::default();
    let mut skipped = 0;

    match source {
        Some(Value::Array(entries)) => {
            for entry in entries {
                match decode_issue(entry, None) {
                    Some(issue) => buckets.push(issue),
                    None => skipped += 1,
                }
            }
        }
        Some(Value::Object(groups)) => {
            for (group, entries) in groups {
                let group_severity = Severity::coerce(group);
                let entries = entries.as_array().map(Vec::as_slice).unwrap_or_default();
                for entry in entries {
                    match decode_issue(entry, Some(group_severity)) {
                        Some(issue) => buckets.push(issue),
                        None => skipped += 1,
                    }
                }
            }
        }
        _ => return Field::Defaulted((buckets, 0)),
    }

    Field::Present((buckets, skipped))
}

/// Decodes one issue entry. `group_severity` applies when the entry has no
/// severity of its own. Returns `None` for entries that are not objects or strings.
fn decode_issue(entry: &Value, group_severity: Option<Severity>) -> Option<Issue> {
    let fallback_severity = group_severity.unwrap_or(Severity::DEFAULT);

    let fields = match entry {
        Value::Object(fields) => fields,
        Value::String(text) => {
            return Some(Issue {
                line_number: None,
                issue_type: DEFAULT_ISSUE_TYPE.to_string(),
                description: text.trim().to_string(),
                suggestion: String::new(),
                severity: fallback_severity,
            });
        }
        _ => return None,
    };

    let text_of = |keys: &[&str]| -> Option<String> {
        first_present(fields, keys)
            .and_then(scalar_text)
            .filter(|s| !s.is_empty())
    };

    let severity = fields
        .get("severity")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(Severity::coerce)
        .unwrap_or(fallback_severity);

    Some(Issue {
        line_number: first_present(fields, &["line_number", "line"]).and_then(line_number_of),
        issue_type: text_of(&["type", "issue_type", "category"])
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| DEFAULT_ISSUE_TYPE.to_string()),
        description: text_of(&["description", "issue", "message"]).unwrap_or_default(),
        suggestion: text_of(&["suggestion", "fix_suggestion", "fix"]).unwrap_or_default(),
        severity,
    })
}

/// Positive integer or integral numeric string; anything else is no line.
fn line_number_of(value: &Value) -> Option<u32> {
    let n = number_of(value)?;
    if n >= 1.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) {
        Some(n as u32)
    } else {
        None
    }
}
