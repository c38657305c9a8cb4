use std::path::{Path, PathBuf};

use chrono::Utc;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use tracing::info;

use crate::report::font_metrics::FontFace;
use crate::report::layout::{build_lines, paginate, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use crate::report::{report_file_name, RenderError, RenderedReport, ReportRenderer};
use crate::review::Review;

const LAYER_NAME: &str = "Layer 1";

/// Writes A4 PDF reports into `reports_dir`, creating it on first use.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    reports_dir: PathBuf,
}

impl PdfRenderer {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    fn document_bytes(&self, review: &Review) -> Result<Vec<u8>, RenderError> {
        let title = format!("Code Review - {}", review.filename);
        let (doc, first_page, first_layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_err)?;

        let pages = paginate(&build_lines(review, Utc::now()));
        let mut targets = vec![(first_page, first_layer)];
        for _ in 1..pages.len() {
            targets.push(doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME));
        }

        for (page, (page_idx, layer_idx)) in pages.iter().zip(targets) {
            let layer = doc.get_page(page_idx).get_layer(layer_idx);
            for line in page {
                let font: &IndirectFontRef = match line.style.face() {
                    FontFace::Regular => &regular,
                    FontFace::Bold => &bold,
                };
                layer.use_text(
                    line.text.clone(),
                    line.style.size_pt(),
                    Mm(line.x_mm),
                    Mm(line.y_mm),
                    font,
                );
            }
        }

        doc.save_to_bytes().map_err(pdf_err)
    }
}

impl ReportRenderer for PdfRenderer {
    fn render(&self, review: &Review) -> Result<RenderedReport, RenderError> {
        let id = review.review_id.ok_or(RenderError::MissingId)?;
        let bytes = self.document_bytes(review)?;

        let file_name = report_file_name(&review.filename, id);
        std::fs::create_dir_all(&self.reports_dir)?;
        std::fs::write(self.reports_dir.join(&file_name), &bytes)?;

        info!(review_id = id, file = %file_name, size = bytes.len(), "PDF report written");
        Ok(RenderedReport { file_name, bytes })
    }

    fn discard(&self, report: &RenderedReport) -> Result<(), RenderError> {
        match std::fs::remove_file(self.reports_dir.join(&report.file_name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn pdf_err(e: impl std::fmt::Display) -> RenderError {
    RenderError::Pdf(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::models::{Issue, Severity};

    fn stored_review(id: i64) -> Review {
        Review {
            review_id: Some(id),
            filename: "calc.py".to_string(),
            language: "Python".to_string(),
            overall_score: 6.5,
            summary: "Works, with one risky division.".to_string(),
            issues_by_severity: vec![Issue {
                line_number: Some(4),
                issue_type: "bug".to_string(),
                description: "Division by zero when the list is empty".to_string(),
                suggestion: "Return early on empty input".to_string(),
                severity: Severity::High,
            }]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_writes_pdf_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let renderer = PdfRenderer::new(dir.path().join("reports"));

        let report = renderer.render(&stored_review(12)).unwrap();
        assert_eq!(report.file_name, "calc_review_12.pdf");
        assert!(report.bytes.starts_with(b"%PDF"));

        let on_disk = std::fs::read(dir.path().join("reports").join(&report.file_name)).unwrap();
        assert_eq!(on_disk, report.bytes);
    }

    #[test]
    fn test_discard_removes_written_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let renderer = PdfRenderer::new(dir.path());

        let report = renderer.render(&stored_review(5)).unwrap();
        let path = dir.path().join(&report.file_name);
        assert!(path.exists());

        renderer.discard(&report).unwrap();
        assert!(!path.exists());
        // Already gone is fine.
        renderer.discard(&report).unwrap();
    }

    #[test]
    fn test_render_requires_stored_review() {
        let dir = tempfile::TempDir::new().unwrap();
        let renderer = PdfRenderer::new(dir.path());
        let mut review = stored_review(1);
        review.review_id = None;
        assert!(matches!(renderer.render(&review), Err(RenderError::MissingId)));
    }

    #[test]
    fn test_render_unwritable_dir_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // A regular file where the directory should be.
        let renderer = PdfRenderer::new(&blocker);
        assert!(matches!(renderer.render(&stored_review(1)), Err(RenderError::Io(_))));
    }
}
