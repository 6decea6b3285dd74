use std::sync::Arc;

use askforce_core::config::FieldValidation;
use askforce_core::{ApplicationError, Extraction, ExtractionParseError, SchemaRegistry};
use tracing::{info, warn};

use crate::llm::{CompletionRequest, GenerationOptions, LlmClient, LlmError};
use crate::prompts::PromptTemplates;

/// Turns a question into an [`Extraction`] with one generation call.
pub struct ExtractionModelAdapter {
    llm: Arc<dyn LlmClient>,
    schemas: Arc<SchemaRegistry>,
    templates: Arc<PromptTemplates>,
    options: GenerationOptions,
    field_validation: FieldValidation,
}

impl ExtractionModelAdapter {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        schemas: Arc<SchemaRegistry>,
        templates: Arc<PromptTemplates>,
        options: GenerationOptions,
    ) -> Self {
        Self { llm, schemas, templates, options, field_validation: FieldValidation::default() }
    }

    pub fn with_field_validation(mut self, field_validation: FieldValidation) -> Self {
        self.field_validation = field_validation;
        self
    }

    pub fn prompt(&self, table: &str, question: &str) -> Result<String, ApplicationError> {
        let fields = self.schemas.fields_for(table)?;
        self.templates.extraction(fields, question).map_err(generation_error)
    }

    pub async fn extract(&self, table: &str, question: &str) -> Result<Extraction, ApplicationError> {
        let prompt = self.prompt(table, question)?;
        let request = CompletionRequest { prompt, options: self.options };

        let raw = self.llm.complete(&request).await.map_err(generation_error)?;
        let extraction = Extraction::from_model_output(&raw).map_err(|error| {
            warn!(
                event_name = "extraction.parse.failed",
                table,
                error = %error,
                raw_output = %raw,
                "model output did not match the extraction contract"
            );
            error
        })?;

        self.check_fields(table, &extraction)?;

        info!(
            event_name = "extraction.completed",
            table,
            target_fields = extraction.target_fields().len(),
            conditions = extraction.condition_fields().len(),
            "extracted query parameters"
        );
        Ok(extraction)
    }

    fn check_fields(&self, table: &str, extraction: &Extraction) -> Result<(), ExtractionParseError> {
        for field in extraction.unknown_fields(&self.schemas, table) {
            match self.field_validation {
                FieldValidation::Strict => {
                    return Err(ExtractionParseError::UnknownField {
                        table: table.to_string(),
                        field: field.to_string(),
                    });
                }
                FieldValidation::Advisory => {
                    warn!(
                        event_name = "extraction.unknown_field",
                        table,
                        field,
                        "extracted field is not in the registered schema"
                    );
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn generation_error(error: LlmError) -> ApplicationError {
    match error {
        LlmError::Configuration(message) => ApplicationError::Configuration(message),
        other => ApplicationError::Generation(other.to_string()),
    }
}
