//! Question answering pipeline over a Salesforce-style data source.
//!
//! The agent runs one fixed sequence per question:
//! 1. **Extraction** (`extraction`) - ask the model for target fields and conditions
//! 2. **Query building** - render SOQL through `askforce_core::QueryBuilder`
//! 3. **Execution** - call the injected `DataSource`
//! 4. **Summarization** (`summarizer`) - ask the model to answer from the retrieved data
//!
//! # Key Types
//!
//! - `AgentRuntime` - Orchestrator (see `runtime` module)
//! - `LlmClient` - Narrow generation trait with HTTP providers in `providers` and the
//!   AWS Bedrock Converse client in `bedrock`
//!
//! The model never writes SOQL. It only names fields and values, and the query text is
//! rendered deterministically by the core crate.

pub mod bedrock;
pub mod extraction;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod runtime;
pub mod summarizer;

pub use bedrock::BedrockLlmClient;
pub use extraction::ExtractionModelAdapter;
pub use llm::{CompletionRequest, GenerationOptions, LlmClient, LlmError};
pub use prompts::PromptTemplates;
pub use providers::{client_from_config, HttpLlmClient};
pub use runtime::{AgentRuntime, Answer};
pub use summarizer::ResultSummarizer;
