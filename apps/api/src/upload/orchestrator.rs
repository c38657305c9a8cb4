//! Upload Orchestrator: the single path from an uploaded file to a stored
//! review.
//!
//! Steps, in order: validate, detect language, analyze (bounded), normalize,
//! persist, then optionally render a report. An analysis failure stores
//! nothing. A render failure is recorded on the stored review and never fails
//! the upload.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisError, AnalysisRequest, CodeAnalyzer};
use crate::errors::AppError;
use crate::language;
use crate::report::{RenderError, RenderedReport, ReportRenderer};
use crate::review::scoring::round_to;
use crate::review::{normalize, Provenance, Review, ReviewContext};
use crate::store::{ReportOutcome, ReviewStore};
use crate::upload::validation::{UploadPolicy, UploadedFile};

const BYTES_PER_MB: f64 = 1_048_576.0;
const UNNAMED_FILE: &str = "unknown";

pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-file result of a batch upload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Reviewed(Box<Review>),
    Failed(BatchFailure),
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub filename: String,
    pub file_size: f64,
    pub language: String,
    pub error: String,
    pub processing_time: f64,
}

pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    analyzer: Arc<dyn CodeAnalyzer>,
    renderer: Arc<dyn ReportRenderer>,
    policy: UploadPolicy,
    analysis_timeout: Duration,
    render_timeout: Duration,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        analyzer: Arc<dyn CodeAnalyzer>,
        renderer: Arc<dyn ReportRenderer>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            analyzer,
            renderer,
            policy,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, analysis: Duration, render: Duration) -> Self {
        self.analysis_timeout = analysis;
        self.render_timeout = render;
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    pub async fn review_upload(
        &self,
        file: UploadedFile,
        export_pdf: bool,
    ) -> Result<Review, AppError> {
        let started = Instant::now();
        let content = self.policy.validate(&file)?;
        let language = language::detect(&file.filename);

        let raw = self
            .analyze(AnalysisRequest {
                filename: &file.filename,
                language,
                content,
            })
            .await
            .map_err(|e| AppError::AnalysisUnavailable(e.to_string()))?;

        let context = ReviewContext {
            filename: &file.filename,
            language,
            file_size: round_to(file.size() as f64 / BYTES_PER_MB, 2),
            processing_time: round_to(started.elapsed().as_secs_f64(), 2),
        };
        let normalized = normalize(&raw, &context);
        match &normalized.provenance {
            Provenance::Parsed {
                defaulted,
                skipped_issues,
            } if !defaulted.is_empty() || *skipped_issues > 0 => {
                debug!(filename = %file.filename, ?defaulted, skipped_issues, "review fields defaulted");
            }
            Provenance::Unparseable { reason } => {
                warn!(filename = %file.filename, %reason, "model output could not be parsed");
            }
            _ => {}
        }

        let mut review = normalized.review;
        let id = self.store.create(&review).await?;
        review.review_id = Some(id);
        info!(
            review_id = id,
            filename = %review.filename,
            language,
            score = review.overall_score,
            issues = review.total_issues(),
            "review stored"
        );

        if export_pdf {
            let outcome = self.render(&review).await;
            outcome.apply(&mut review);
            if let Err(e) = self.store.record_report(id, &outcome).await {
                warn!(review_id = id, "could not record report outcome: {e}");
            }
        }

        Ok(review)
    }

    /// Reviews each file in order. A failed file becomes a `BatchFailure`
    /// entry; only the batch size check fails the whole request.
    pub async fn review_batch(
        &self,
        files: Vec<UploadedFile>,
        export_pdf: bool,
    ) -> Result<Vec<BatchEntry>, AppError> {
        self.policy.check_batch_size(files.len())?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let filename = if file.filename.trim().is_empty() {
                UNNAMED_FILE.to_string()
            } else {
                file.filename.clone()
            };
            let language = language::detect(&filename);

            match self.review_upload(file, export_pdf).await {
                Ok(review) => entries.push(BatchEntry::Reviewed(Box::new(review))),
                Err(e) => {
                    warn!(%filename, "batch entry failed: {e}");
                    entries.push(BatchEntry::Failed(BatchFailure {
                        filename,
                        file_size: 0.0,
                        language: language.to_string(),
                        error: e.detail(),
                        processing_time: 0.0,
                    }));
                }
            }
        }
        Ok(entries)
    }

    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<String, AnalysisError> {
        match tokio::time::timeout(self.analysis_timeout, self.analyzer.analyze(request)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::TimedOut(self.analysis_timeout)),
        }
    }

    async fn render(&self, review: &Review) -> ReportOutcome {
        let renderer = Arc::clone(&self.renderer);
        let snapshot = review.clone();
        // CPU-bound; keep it off the async workers.
        let mut task = tokio::task::spawn_blocking(move || renderer.render(&snapshot));

        let waited = tokio::time::timeout(self.render_timeout, &mut task).await;
        let result = match waited {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(join)) => Err(RenderError::Task(join.to_string())),
            Err(_) => {
                self.discard_when_done(task);
                Err(RenderError::TimedOut(self.render_timeout))
            }
        };

        match result {
            Ok(report) => {
                debug!(file = %report.file_name, size = report.bytes.len(), "report rendered");
                ReportOutcome::Rendered {
                    url: report.download_url(),
                }
            }
            Err(e) => {
                warn!(filename = %review.filename, "PDF render failed: {e}");
                ReportOutcome::Failed {
                    error: e.user_message(),
                }
            }
        }
    }

    /// A timed-out blocking render keeps running; whatever it writes is
    /// removed so only the recorded `pdf_error` remains.
    fn discard_when_done(&self, task: JoinHandle<Result<RenderedReport, RenderError>>) {
        let renderer = Arc::clone(&self.renderer);
        tokio::spawn(async move {
            if let Ok(Ok(late)) = task.await {
                warn!(file = %late.file_name, "discarding report finished after timeout");
                if let Err(e) = renderer.discard(&late) {
                    warn!(file = %late.file_name, "could not discard late report: {e}");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::models::review_record::ReviewRecord;
    use crate::report::PdfRenderer;
    use crate::review::Severity;
    use crate::store::{
        MemoryReviewStore, PageRequest, ReviewPage, ReviewStats, StoreError,
    };

    const TWO_ISSUES: &str = r#"{
        "overall_score": 7,
        "summary": "Mostly fine.",
        "suggestions": ["Add input validation"],
        "issues": [
            {"line": 12, "type": "bug", "severity": "high", "description": "Possible division by zero"},
            {"line": 30, "type": "style", "severity": "low", "description": "Line too long"}
        ]
    }"#;

    struct FakeAnalyzer {
        reply: Result<&'static str, &'static str>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FakeAnalyzer {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &'static str) -> Self {
            Self {
                reply: Err(message),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CodeAnalyzer for FakeAnalyzer {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn analyze(&self, _request: AnalysisRequest<'_>) -> Result<String, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply
                .map(str::to_string)
                .map_err(|m| AnalysisError::Model(m.to_string()))
        }
    }

    struct FailingRenderer;

    impl ReportRenderer for FailingRenderer {
        fn render(&self, _review: &Review) -> Result<RenderedReport, RenderError> {
            Err(RenderError::Pdf("font table missing".to_string()))
        }
    }

    /// Writes a real report, but only after `delay`.
    struct SlowRenderer {
        inner: PdfRenderer,
        delay: Duration,
        discarded: Arc<AtomicBool>,
    }

    impl SlowRenderer {
        fn new(dir: impl Into<PathBuf>, delay: Duration) -> Self {
            Self {
                inner: PdfRenderer::new(dir),
                delay,
                discarded: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl ReportRenderer for SlowRenderer {
        fn render(&self, review: &Review) -> Result<RenderedReport, RenderError> {
            std::thread::sleep(self.delay);
            self.inner.render(review)
        }

        fn discard(&self, report: &RenderedReport) -> Result<(), RenderError> {
            let result = self.inner.discard(report);
            self.discarded.store(true, Ordering::SeqCst);
            result
        }
    }

    struct PanickingRenderer;

    impl ReportRenderer for PanickingRenderer {
        fn render(&self, _review: &Review) -> Result<RenderedReport, RenderError> {
            panic!("layout exploded");
        }
    }

    /// Store whose writes always fail.
    struct DownStore;

    #[async_trait]
    impl ReviewStore for DownStore {
        async fn create(&self, _review: &Review) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn get(&self, id: i64) -> Result<ReviewRecord, StoreError> {
            Err(StoreError::NotFound(id))
        }
        async fn list(&self, _page: PageRequest) -> Result<ReviewPage, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn delete(&self, id: i64) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id))
        }
        async fn summary(&self, _since: DateTime<Utc>) -> Result<ReviewStats, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn record_report(&self, id: i64, _o: &ReportOutcome) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id))
        }
    }

    fn policy() -> UploadPolicy {
        UploadPolicy {
            supported_extensions: vec![".py".into(), ".rs".into()],
            max_file_size_kb: 200,
            max_files_per_request: 3,
        }
    }

    fn service(
        store: Arc<dyn ReviewStore>,
        analyzer: Arc<dyn CodeAnalyzer>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> ReviewService {
        ReviewService::new(store, analyzer, renderer, policy())
    }

    fn python_file(size: usize) -> UploadedFile {
        let mut body = "x = 1\n".repeat(size / 6 + 1).into_bytes();
        body.truncate(size);
        UploadedFile::new("calc.py", body)
    }

    #[tokio::test]
    async fn test_upload_reviews_and_stores() {
        let store = Arc::new(MemoryReviewStore::new());
        let svc = service(
            store.clone(),
            Arc::new(FakeAnalyzer::replying(TWO_ISSUES)),
            Arc::new(FailingRenderer),
        );

        let review = svc.review_upload(python_file(5 * 1024), false).await.unwrap();

        assert_eq!(review.language, "Python");
        assert_eq!(review.total_issues(), 2);
        assert_eq!(review.issues_by_severity.count(Severity::High), 1);
        assert_eq!(review.issues_by_severity.count(Severity::Low), 1);
        assert_eq!(review.overall_score, 7.0);
        assert_eq!(review.file_size, 0.0);
        assert!(review.pdf_report.is_none() && review.pdf_error.is_none());

        let id = review.review_id.expect("id attached");
        let record = store.get(id).await.unwrap();
        assert_eq!(record.summary.total_issues, 2);
        assert_eq!(record.summary.language.as_deref(), Some("Python"));
    }

    #[tokio::test]
    async fn test_oversize_rejected_before_analysis() {
        let analyzer = Arc::new(FakeAnalyzer::replying(TWO_ISSUES));
        let store = Arc::new(MemoryReviewStore::new());
        let svc = service(store.clone(), analyzer.clone(), Arc::new(FailingRenderer));

        let err = svc
            .review_upload(python_file(200 * 1024 + 1), false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.list(PageRequest::default()).await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_stores_nothing() {
        let store = Arc::new(MemoryReviewStore::new());
        let svc = service(
            store.clone(),
            Arc::new(FakeAnalyzer::failing("rate limited")),
            Arc::new(FailingRenderer),
        );

        let err = svc.review_upload(python_file(100), false).await.unwrap_err();
        assert!(matches!(err, AppError::AnalysisUnavailable(_)));
        assert_eq!(store.list(PageRequest::default()).await.unwrap().total_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_timeout_stores_nothing() {
        let store = Arc::new(MemoryReviewStore::new());
        let slow = FakeAnalyzer {
            delay: Some(Duration::from_secs(600)),
            ..FakeAnalyzer::replying(TWO_ISSUES)
        };
        let svc = service(store.clone(), Arc::new(slow), Arc::new(FailingRenderer))
            .with_timeouts(Duration::from_secs(60), Duration::from_secs(30));

        let err = svc.review_upload(python_file(100), false).await.unwrap_err();
        match err {
            AppError::AnalysisUnavailable(msg) => assert!(msg.contains("timed out after 60s")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.list(PageRequest::default()).await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn test_unparseable_output_still_stored_with_fallback() {
        let store = Arc::new(MemoryReviewStore::new());
        let svc = service(
            store.clone(),
            Arc::new(FakeAnalyzer::replying("I could not review this file, sorry.")),
            Arc::new(FailingRenderer),
        );

        let review = svc.review_upload(python_file(100), false).await.unwrap();
        assert_eq!(review.overall_score, 0.0);
        assert_eq!(review.total_issues(), 0);
        assert!(store.get(review.review_id.unwrap()).await.is_ok());
    }

    #[tokio::test]
    async fn test_storage_failure_is_unavailable() {
        let svc = service(
            Arc::new(DownStore),
            Arc::new(FakeAnalyzer::replying(TWO_ISSUES)),
            Arc::new(FailingRenderer),
        );
        let err = svc.review_upload(python_file(100), false).await.unwrap_err();
        assert!(matches!(err, AppError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_render_failure_recorded_and_review_kept() {
        let store = Arc::new(MemoryReviewStore::new());
        let svc = service(
            store.clone(),
            Arc::new(FakeAnalyzer::replying(TWO_ISSUES)),
            Arc::new(FailingRenderer),
        );

        let review = svc.review_upload(python_file(100), true).await.unwrap();
        assert!(review.pdf_report.is_none());
        assert_eq!(
            review.pdf_error.as_deref(),
            Some("Failed to generate PDF report: font table missing")
        );

        let stored = store.get(review.review_id.unwrap()).await.unwrap();
        assert_eq!(stored.review_json.pdf_error, review.pdf_error);
    }

    #[tokio::test]
    async fn test_render_timeout_recorded_and_late_file_removed() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(MemoryReviewStore::new());
        let renderer = SlowRenderer::new(dir.path(), Duration::from_millis(300));
        let discarded = renderer.discarded.clone();
        let svc = service(
            store.clone(),
            Arc::new(FakeAnalyzer::replying(TWO_ISSUES)),
            Arc::new(renderer),
        )
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(50));

        let review = svc.review_upload(python_file(100), true).await.unwrap();
        let id = review.review_id.unwrap();
        assert!(review.pdf_report.is_none());
        assert_eq!(
            review.pdf_error.as_deref(),
            Some("Failed to generate PDF report: timed out after 50ms")
        );

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.review_json.pdf_error, review.pdf_error);
        assert!(stored.review_json.pdf_report.is_none());

        for _ in 0..100 {
            if discarded.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(discarded.load(Ordering::SeqCst));
        assert!(!dir.path().join(format!("calc_review_{id}.pdf")).exists());
    }

    #[tokio::test]
    async fn test_render_panic_recorded_and_review_kept() {
        let store = Arc::new(MemoryReviewStore::new());
        let svc = service(
            store.clone(),
            Arc::new(FakeAnalyzer::replying(TWO_ISSUES)),
            Arc::new(PanickingRenderer),
        );

        let review = svc.review_upload(python_file(100), true).await.unwrap();
        assert!(review.pdf_report.is_none());
        let error = review.pdf_error.clone().unwrap();
        assert!(error.starts_with("Failed to generate PDF report: render task failed"));
        assert!(error.contains("panicked"));

        let stored = store.get(review.review_id.unwrap()).await.unwrap();
        assert_eq!(stored.review_json.pdf_error, review.pdf_error);
        assert!(stored.review_json.pdf_report.is_none());
    }

    #[tokio::test]
    async fn test_render_success_links_download() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(MemoryReviewStore::new());
        let svc = service(
            store.clone(),
            Arc::new(FakeAnalyzer::replying(TWO_ISSUES)),
            Arc::new(PdfRenderer::new(dir.path())),
        );

        let review = svc.review_upload(python_file(100), true).await.unwrap();
        let id = review.review_id.unwrap();
        let expected = format!("calc_review_{id}.pdf");

        assert_eq!(
            review.pdf_report.as_deref(),
            Some(format!("/api/download-pdf/{expected}").as_str())
        );
        assert!(review.pdf_error.is_none());
        assert!(dir.path().join(&expected).exists());
        assert_eq!(
            store.get(id).await.unwrap().review_json.pdf_report,
            review.pdf_report
        );
    }

    #[tokio::test]
    async fn test_batch_mixes_results_and_failures() {
        let svc = service(
            Arc::new(MemoryReviewStore::new()),
            Arc::new(FakeAnalyzer::replying(TWO_ISSUES)),
            Arc::new(FailingRenderer),
        );

        let entries = svc
            .review_batch(
                vec![
                    python_file(100),
                    UploadedFile::new("notes.exe", "hello"),
                    UploadedFile::new("", "x"),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert!(matches!(&entries[0], BatchEntry::Reviewed(r) if r.review_id.is_some()));
        match &entries[1] {
            BatchEntry::Failed(f) => {
                assert_eq!(f.filename, "notes.exe");
                assert_eq!(f.language, "Unknown");
                assert!(f.error.starts_with("File type not supported"));
                assert_eq!(f.file_size, 0.0);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(matches!(&entries[2], BatchEntry::Failed(f) if f.filename == "unknown"));
    }

    #[tokio::test]
    async fn test_batch_rejects_too_many_files() {
        let analyzer = Arc::new(FakeAnalyzer::replying(TWO_ISSUES));
        let svc = service(
            Arc::new(MemoryReviewStore::new()),
            analyzer.clone(),
            Arc::new(FailingRenderer),
        );
        let files = (0..4).map(|_| python_file(10)).collect();

        let err = svc.review_batch(files, false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    }
}
