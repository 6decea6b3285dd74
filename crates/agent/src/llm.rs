use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Sampling bounds for one generation call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    /// Low temperature, short output: enough for a small JSON object or a few sentences.
    fn default() -> Self {
        Self { temperature: 0.3, max_tokens: 512 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub options: GenerationOptions,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm client is not configured: {0}")]
    Configuration(String),
    #[error("prompt rendering failed: {0}")]
    Prompt(String),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}
