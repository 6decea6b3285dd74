use std::sync::Arc;
use std::time::{Duration, Instant};

use askforce_core::config::AppConfig;
use askforce_core::{
    ApplicationError, Cardinality, DataSource, Extraction, FetchFlags, QueryBuilder, QueryOutcome,
};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::extraction::{generation_error, ExtractionModelAdapter};
use crate::llm::{GenerationOptions, LlmClient};
use crate::prompts::PromptTemplates;
use crate::summarizer::ResultSummarizer;

/// Everything one question produced, in pipeline order.
#[derive(Clone, Debug)]
pub struct Answer {
    pub correlation_id: String,
    pub table: String,
    pub extraction: Extraction,
    pub soql: String,
    pub cardinality: Cardinality,
    pub outcome: QueryOutcome,
    pub summary: String,
    pub elapsed: Duration,
}

impl Answer {
    pub fn to_json(&self) -> Value {
        json!({
            "correlation_id": self.correlation_id,
            "table": self.table,
            "extraction": self.extraction,
            "soql": self.soql,
            "cardinality": self.cardinality,
            "data_available": !matches!(self.outcome, QueryOutcome::Unavailable),
            "data": self.outcome.to_json(),
            "summary": self.summary,
            "elapsed_secs": self.elapsed.as_secs_f64(),
        })
    }
}

pub struct AgentRuntime {
    extractor: ExtractionModelAdapter,
    builder: QueryBuilder,
    source: Arc<dyn DataSource>,
    summarizer: ResultSummarizer,
}

impl AgentRuntime {
    pub fn new(
        extractor: ExtractionModelAdapter,
        builder: QueryBuilder,
        source: Arc<dyn DataSource>,
        summarizer: ResultSummarizer,
    ) -> Self {
        Self { extractor, builder, source, summarizer }
    }

    /// Wires both generation stages to one model client using the configured bounds.
    pub fn from_config(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, ApplicationError> {
        let templates = Arc::new(PromptTemplates::new().map_err(generation_error)?);
        let options = GenerationOptions {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        };

        let extractor = ExtractionModelAdapter::new(
            llm.clone(),
            config.schemas.clone(),
            templates.clone(),
            options,
        )
        .with_field_validation(config.pipeline.field_validation);
        let summarizer = ResultSummarizer::new(llm, templates, options);

        Ok(Self::new(extractor, QueryBuilder::new(config.schemas.clone()), source, summarizer))
    }

    pub async fn ask(
        &self,
        table: &str,
        question: &str,
        fetch: FetchFlags,
    ) -> Result<Answer, ApplicationError> {
        let started = Instant::now();
        let cardinality = fetch.resolve()?;
        let correlation_id = Uuid::new_v4().to_string();

        info!(
            event_name = "pipeline.ask.start",
            correlation_id = %correlation_id,
            table,
            cardinality = ?cardinality,
            "answering question"
        );

        let extraction = self.extractor.extract(table, question).await?;
        let request = self.builder.build(table, &extraction, fetch)?;
        let soql = request.soql();
        info!(
            event_name = "pipeline.query.built",
            correlation_id = %correlation_id,
            soql = %soql,
            "rendered query"
        );

        let outcome = match self.source.execute(&request).await {
            Ok(outcome) => outcome,
            Err(source_error) if source_error.is_degradable() => {
                error!(
                    event_name = "pipeline.source.failed",
                    correlation_id = %correlation_id,
                    error = %source_error,
                    "data source call failed; continuing without data"
                );
                QueryOutcome::Unavailable
            }
            Err(source_error) => return Err(source_error.into()),
        };

        let summary = self.summarizer.summarize(question, &outcome).await?;
        let elapsed = started.elapsed();

        info!(
            event_name = "pipeline.ask.completed",
            correlation_id = %correlation_id,
            records = outcome.record_count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "answered question"
        );

        Ok(Answer {
            correlation_id,
            table: table.to_string(),
            extraction,
            soql,
            cardinality,
            outcome,
            summary,
            elapsed,
        })
    }
}
