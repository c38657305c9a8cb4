//! Analysis: the collaborator that turns source code into raw review text.
//!
//! Implementations return the model's output unparsed; interpreting it is the
//! normalizer's job. `ReviewService` holds an `Arc<dyn CodeAnalyzer>`, chosen at
//! startup: `LlmAnalyzer` when an API key is configured, `HeuristicAnalyzer`
//! otherwise.

pub mod heuristic;
pub mod llm;
pub mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use heuristic::HeuristicAnalyzer;
pub use llm::LlmAnalyzer;

/// What the analyzer gets to see.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub filename: &'a str,
    pub language: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("model call failed: {0}")]
    Model(String),

    #[error("analysis timed out after {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait CodeAnalyzer: Send + Sync {
    /// Short backend name, surfaced by the health endpoint.
    fn name(&self) -> &'static str;

    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<String, AnalysisError>;
}
