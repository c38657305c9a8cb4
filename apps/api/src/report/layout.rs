//! Report layout: turns a Review into positioned text lines on A4 pages.
//!
//! Everything here is pure so it can be tested without a PDF writer; `pdf.rs`
//! only paints what `paginate` returns.

use chrono::{DateTime, Utc};

use crate::report::font_metrics::{metrics_for, FontFace};
use crate::review::{Review, Severity};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 20.0;

const PT_PER_MM: f32 = 72.0 / 25.4;
const LINE_SPACING: f32 = 1.35;
const INDENT_MM: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Label,
    Body,
}

impl TextStyle {
    pub fn size_pt(self) -> f32 {
        match self {
            TextStyle::Title => 18.0,
            TextStyle::Heading => 13.0,
            TextStyle::Label => 10.5,
            TextStyle::Body => 10.0,
        }
    }

    pub fn face(self) -> FontFace {
        match self {
            TextStyle::Body => FontFace::Regular,
            _ => FontFace::Bold,
        }
    }

    fn line_height_mm(self) -> f32 {
        self.size_pt() * LINE_SPACING / PT_PER_MM
    }

    fn space_before_mm(self) -> f32 {
        match self {
            TextStyle::Heading => 5.0,
            TextStyle::Label => 1.5,
            _ => 0.0,
        }
    }
}

/// One wrapped line, before placement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub text: String,
    pub style: TextStyle,
    pub indent_mm: f32,
}

/// A line with its baseline position, measured from the page's bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub style: TextStyle,
    pub x_mm: f32,
    pub y_mm: f32,
}

pub type Page = Vec<PlacedLine>;

struct Builder {
    lines: Vec<ReportLine>,
}

impl Builder {
    fn push(&mut self, text: &str, style: TextStyle, indent_mm: f32) {
        let width_pt = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM - indent_mm) * PT_PER_MM;
        let safe = pdf_safe(text);
        for line in metrics_for(style.face()).wrap(&safe, style.size_pt(), width_pt) {
            self.lines.push(ReportLine {
                text: line,
                style,
                indent_mm,
            });
        }
    }

    fn heading(&mut self, text: &str) {
        self.push(text, TextStyle::Heading, 0.0);
    }

    fn body(&mut self, text: &str) {
        self.push(text, TextStyle::Body, 0.0);
    }
}

/// Builds the report's lines in reading order.
pub fn build_lines(review: &Review, generated_at: DateTime<Utc>) -> Vec<ReportLine> {
    let mut b = Builder { lines: Vec::new() };

    b.push("Code Review Report", TextStyle::Title, 0.0);

    b.heading("File Information");
    b.body(&format!("File: {}", review.filename));
    b.body(&format!("Language: {}", review.language));
    b.body(&format!("Overall Score: {:.1}/10", review.overall_score));
    b.body(&format!("Total Issues: {}", review.total_issues()));
    b.body(&format!(
        "Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if !review.summary.trim().is_empty() {
        b.heading("Summary");
        b.body(&review.summary);
    }

    b.heading("Quality Metrics");
    b.body(&format!(
        "Complexity Score: {:.1}/10",
        review.quality_metrics.complexity_score
    ));
    b.body(&format!(
        "Maintainability Score: {:.1}/10",
        review.quality_metrics.maintainability_score
    ));
    b.body(&format!("Suggestions: {}", review.suggestions.len()));

    let assessment = [
        ("Readability", &review.readability),
        ("Modularity", &review.modularity),
        ("Potential Bugs", &review.potential_bugs),
    ];
    if assessment.iter().any(|(_, text)| !text.trim().is_empty()) {
        b.heading("Assessment");
        for (label, text) in assessment {
            if text.trim().is_empty() {
                continue;
            }
            b.push(label, TextStyle::Label, 0.0);
            b.body(text);
        }
    }

    if !review.suggestions.is_empty() {
        b.heading("Suggestions");
        for (i, suggestion) in review.suggestions.iter().enumerate() {
            b.body(&format!("{}. {}", i + 1, suggestion));
        }
    }

    b.heading("Issues");
    if review.issues_by_severity.is_empty() {
        b.body("No issues were identified.");
    }
    for severity in Severity::ALL {
        let bucket = review.issues_by_severity.bucket(severity);
        if bucket.is_empty() {
            continue;
        }
        b.push(
            &format!("{} ({})", severity_title(severity), bucket.len()),
            TextStyle::Label,
            0.0,
        );
        for issue in bucket {
            let location = match issue.line_number {
                Some(line) => format!("Line {line}"),
                None => "General".to_string(),
            };
            b.push(
                &format!("{location} [{}]: {}", issue.issue_type, issue.description),
                TextStyle::Body,
                INDENT_MM,
            );
            if !issue.suggestion.trim().is_empty() {
                b.push(
                    &format!("Fix: {}", issue.suggestion),
                    TextStyle::Body,
                    2.0 * INDENT_MM,
                );
            }
        }
    }

    b.lines
}

/// Places lines top to bottom, starting a new page when the bottom margin
/// would be crossed. Always returns at least one page.
pub fn paginate(lines: &[ReportLine]) -> Vec<Page> {
    let top = PAGE_HEIGHT_MM - MARGIN_MM;
    let mut pages: Vec<Page> = vec![Vec::new()];
    let mut cursor = top;

    for line in lines {
        let step = line.style.space_before_mm() + line.style.line_height_mm();
        let on_fresh_page = cursor >= top;
        let mut y = cursor - if on_fresh_page { line.style.line_height_mm() } else { step };

        if y < MARGIN_MM && !on_fresh_page {
            pages.push(Vec::new());
            y = top - line.style.line_height_mm();
        }

        if let Some(page) = pages.last_mut() {
            page.push(PlacedLine {
                text: line.text.clone(),
                style: line.style,
                x_mm: MARGIN_MM + line.indent_mm,
                y_mm: y,
            });
        }
        cursor = y;
    }
    pages
}

fn severity_title(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical",
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
    }
}

/// The builtin fonts only cover printable ASCII reliably.
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            ' '..='~' => c,
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            _ => '?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::models::{Issue, QualityMetrics};
    use chrono::TimeZone;

    fn issue(line: Option<u32>, severity: Severity, description: &str) -> Issue {
        Issue {
            line_number: line,
            issue_type: "bug".to_string(),
            description: description.to_string(),
            suggestion: "Fix it".to_string(),
            severity,
        }
    }

    fn sample_review() -> Review {
        Review {
            filename: "app.py".to_string(),
            language: "Python".to_string(),
            overall_score: 7.5,
            summary: "Reasonable code.".to_string(),
            readability: "Clear names.".to_string(),
            suggestions: vec!["Add tests".to_string()],
            issues_by_severity: vec![
                issue(Some(3), Severity::Low, "Long line"),
                issue(Some(10), Severity::Critical, "Division by zero"),
            ]
            .into_iter()
            .collect(),
            quality_metrics: QualityMetrics {
                complexity_score: 6.0,
                maintainability_score: 8.0,
            },
            ..Default::default()
        }
    }

    fn texts(lines: &[ReportLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_build_lines_sections_in_order() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap();
        let lines = build_lines(&sample_review(), at);
        let t = texts(&lines);

        assert_eq!(t[0], "Code Review Report");
        assert!(t.contains(&"File: app.py"));
        assert!(t.contains(&"Overall Score: 7.5/10"));
        assert!(t.contains(&"Total Issues: 2"));
        assert!(t.contains(&"Generated: 2026-05-01 09:30:00 UTC"));
        assert!(t.contains(&"1. Add tests"));

        // Critical is listed before Low.
        let critical = t.iter().position(|s| *s == "Critical (1)").unwrap();
        let low = t.iter().position(|s| *s == "Low (1)").unwrap();
        assert!(critical < low);
        assert_eq!(t[critical + 1], "Line 10 [bug]: Division by zero");
        assert_eq!(t[critical + 2], "Fix: Fix it");
    }

    #[test]
    fn test_build_lines_skips_empty_assessment_fields() {
        let lines = build_lines(&sample_review(), Utc::now());
        let t = texts(&lines);
        assert!(t.contains(&"Readability"));
        assert!(!t.contains(&"Modularity"));
        assert!(!t.contains(&"Potential Bugs"));
    }

    #[test]
    fn test_build_lines_no_issues() {
        let review = Review {
            filename: "ok.rs".to_string(),
            ..Default::default()
        };
        let lines = build_lines(&review, Utc::now());
        assert!(texts(&lines).contains(&"No issues were identified."));
    }

    #[test]
    fn test_non_ascii_is_replaced() {
        assert_eq!(pdf_safe("naïve “quote”\tx"), "na?ve \"quote\" x");
    }

    #[test]
    fn test_paginate_breaks_pages_within_margins() {
        let review = Review {
            filename: "big.py".to_string(),
            issues_by_severity: (1..=120)
                .map(|n| issue(Some(n), Severity::Medium, "Something is off here"))
                .collect(),
            ..Default::default()
        };
        let lines = build_lines(&review, Utc::now());
        let pages = paginate(&lines);

        assert!(pages.len() > 1);
        let placed: usize = pages.iter().map(Vec::len).sum();
        assert_eq!(placed, lines.len());
        for page in &pages {
            assert!(!page.is_empty());
            for line in page {
                assert!(line.y_mm >= MARGIN_MM, "below margin: {line:?}");
                assert!(line.y_mm <= PAGE_HEIGHT_MM - MARGIN_MM);
            }
            // Baselines descend within a page.
            assert!(page.windows(2).all(|w| w[1].y_mm < w[0].y_mm));
        }
    }

    #[test]
    fn test_paginate_empty_has_one_page() {
        assert_eq!(paginate(&[]).len(), 1);
    }
}
