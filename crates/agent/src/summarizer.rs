use std::sync::Arc;

use askforce_core::{ApplicationError, QueryOutcome};
use tracing::info;

use crate::extraction::generation_error;
use crate::llm::{CompletionRequest, GenerationOptions, LlmClient};
use crate::prompts::PromptTemplates;

/// Produces the natural-language answer from the question and retrieved data.
pub struct ResultSummarizer {
    llm: Arc<dyn LlmClient>,
    templates: Arc<PromptTemplates>,
    options: GenerationOptions,
}

impl ResultSummarizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        templates: Arc<PromptTemplates>,
        options: GenerationOptions,
    ) -> Self {
        Self { llm, templates, options }
    }

    /// Missing data is summarized too; the model is told there is nothing to report.
    pub async fn summarize(
        &self,
        question: &str,
        outcome: &QueryOutcome,
    ) -> Result<String, ApplicationError> {
        let prompt =
            self.templates.summary(question, &outcome.to_json()).map_err(generation_error)?;
        let request = CompletionRequest { prompt, options: self.options };

        let summary = self.llm.complete(&request).await.map_err(generation_error)?;
        info!(
            event_name = "summary.completed",
            records = outcome.record_count(),
            summary_chars = summary.len(),
            "generated summary"
        );
        Ok(summary)
    }
}
