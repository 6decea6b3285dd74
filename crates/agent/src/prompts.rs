//! Fixed prompt contracts for the two generation calls.

use askforce_core::extraction::{CONDITION_FIELDS_KEY, CONDITION_VALUES_KEY, TARGET_FIELDS_KEY};
use serde_json::Value;
use tera::{Context, Tera};

use crate::llm::LlmError;

const EXTRACTION_TEMPLATE: &str = "extraction.txt";
const SUMMARY_TEMPLATE: &str = "summary.txt";

const EXTRACTION_PROMPT: &str = "\
Analyze the user query and extract the relevant details based on the available column list. Identify:
1. The exact column names that should be retrieved.
2. The condition column names on which the query is based.
3. The values for the condition columns.

Use the following column list for reference:
{{ columns }}

User Query: {{ question }}

{{ format_instructions }}
";

const SUMMARY_PROMPT: &str = "\
Given the user query:
{{ question }}

And the retrieved Salesforce data:
{{ data }}

Generate a concise summary relevant to the query.
";

pub struct PromptTemplates {
    tera: Tera,
}

impl PromptTemplates {
    pub fn new() -> Result<Self, LlmError> {
        let mut tera = Tera::default();
        tera.add_raw_templates([
            (EXTRACTION_TEMPLATE, EXTRACTION_PROMPT),
            (SUMMARY_TEMPLATE, SUMMARY_PROMPT),
        ])
        .map_err(|error| LlmError::Prompt(error.to_string()))?;
        Ok(Self { tera })
    }

    pub fn extraction(&self, fields: &[String], question: &str) -> Result<String, LlmError> {
        let mut context = Context::new();
        context.insert("columns", &render_field_list(fields));
        context.insert("question", question);
        context.insert("format_instructions", &format_instructions());
        self.render(EXTRACTION_TEMPLATE, &context)
    }

    pub fn summary(&self, question: &str, data: &Value) -> Result<String, LlmError> {
        let data = serde_json::to_string_pretty(data)
            .map_err(|error| LlmError::Prompt(error.to_string()))?;

        let mut context = Context::new();
        context.insert("question", question);
        context.insert("data", &data);
        self.render(SUMMARY_TEMPLATE, &context)
    }

    fn render(&self, template: &str, context: &Context) -> Result<String, LlmError> {
        self.tera.render(template, context).map_err(|error| LlmError::Prompt(error.to_string()))
    }
}

fn render_field_list(fields: &[String]) -> String {
    let quoted = fields.iter().map(|field| format!("'{field}'")).collect::<Vec<_>>();
    format!("[{}]", quoted.join(", "))
}

fn format_instructions() -> String {
    format!(
        "Respond with a single JSON object and nothing else: no markdown, no code fences, no \
explanation. The object must have exactly these keys:
- \"{TARGET_FIELDS_KEY}\": array of strings, the columns to retrieve, taken verbatim from the column list
- \"{CONDITION_FIELDS_KEY}\": array of strings, the columns used for filtering, taken verbatim from the column list
- \"{CONDITION_VALUES_KEY}\": array of strings or numbers, one filter value per entry of \"{CONDITION_FIELDS_KEY}\", in the same order
Example: {{\"{TARGET_FIELDS_KEY}\": [\"Name\"], \"{CONDITION_FIELDS_KEY}\": [\"Id\"], \"{CONDITION_VALUES_KEY}\": [\"a2e000000000001\"]}}"
    )
}
