use async_trait::async_trait;
use tracing::debug;

use crate::analysis::prompts::{build_review_prompt, REVIEW_SYSTEM};
use crate::analysis::{AnalysisError, AnalysisRequest, CodeAnalyzer};
use crate::llm_client::LlmClient;

/// Sends the file to the model vendor through `LlmClient`.
pub struct LlmAnalyzer {
    llm: LlmClient,
}

impl LlmAnalyzer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CodeAnalyzer for LlmAnalyzer {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<String, AnalysisError> {
        let prompt = build_review_prompt(request.language, request.filename, request.content);
        let text = self
            .llm
            .complete(&prompt, REVIEW_SYSTEM)
            .await
            .map_err(|e| AnalysisError::Model(e.to_string()))?;
        debug!(filename = request.filename, bytes = text.len(), "model review received");
        Ok(text)
    }
}
