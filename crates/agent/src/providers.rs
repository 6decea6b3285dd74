//! HTTP clients for the supported text-generation providers.

use std::sync::Arc;
use std::time::Duration;

use askforce_core::config::{LlmConfig, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::bedrock::BedrockLlmClient;
use crate::llm::{CompletionRequest, LlmClient, LlmError};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Builds the client for the configured provider.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match config.provider {
        LlmProvider::Bedrock => Ok(Arc::new(BedrockLlmClient::from_config(config)?)),
        _ => Ok(Arc::new(HttpLlmClient::from_config(config)?)),
    }
}

pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key =
            config.api_key().map_err(|error| LlmError::Configuration(error.to_string()))?.cloned();

        let base_url = match (&config.base_url, config.provider) {
            (_, LlmProvider::Bedrock) => {
                return Err(LlmError::Configuration(
                    "bedrock requests are signed by the AWS SDK; use BedrockLlmClient".to_string(),
                ))
            }
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, LlmProvider::Anthropic) => ANTHROPIC_BASE_URL.to_string(),
            (None, LlmProvider::OpenAi) => OPENAI_BASE_URL.to_string(),
            (None, LlmProvider::Ollama) => {
                return Err(LlmError::Configuration(
                    "llm.base_url is required for ollama provider".to_string(),
                ))
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Configuration(format!("failed to build http client: {error}")))?;

        Ok(Self { client, provider: config.provider, base_url, model: config.model.clone(), api_key })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| LlmError::Configuration("llm.api_key is not set".to_string()))
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        body: &Value,
    ) -> Result<Value, LlmError> {
        let response =
            request.json(body).send().await.map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        response.json::<Value>().await.map_err(|error| LlmError::Decode(error.to_string()))
    }

    async fn complete_anthropic(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "max_tokens": request.options.max_tokens,
            "temperature": request.options.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        let builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let payload = self.post_json(builder, &body).await?;
        let message = decode::<AnthropicMessage>(payload)?;
        let text = message
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<String>();
        non_empty(text)
    }

    async fn complete_openai(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "max_tokens": request.options.max_tokens,
            "temperature": request.options.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key()?);

        let payload = self.post_json(builder, &body).await?;
        let completion = decode::<OpenAiCompletion>(payload)?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        non_empty(text)
    }

    async fn complete_ollama(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "messages": [{ "role": "user", "content": request.prompt }],
            "options": {
                "temperature": request.options.temperature,
                "num_predict": request.options.max_tokens,
            },
        });
        let builder = self.client.post(format!("{}/api/chat", self.base_url));

        let payload = self.post_json(builder, &body).await?;
        let chat = decode::<OllamaChat>(payload)?;
        non_empty(chat.message.content)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!(
            event_name = "llm.request.start",
            provider = ?self.provider,
            model = %self.model,
            prompt_chars = request.prompt.len(),
            "sending completion request"
        );

        match self.provider {
            LlmProvider::Anthropic => self.complete_anthropic(request).await,
            LlmProvider::OpenAi => self.complete_openai(request).await,
            LlmProvider::Ollama => self.complete_ollama(request).await,
            LlmProvider::Bedrock => Err(LlmError::Configuration(
                "bedrock requests are signed by the AWS SDK; use BedrockLlmClient".to_string(),
            )),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(payload: Value) -> Result<T, LlmError> {
    serde_json::from_value(payload).map_err(|error| LlmError::Decode(error.to_string()))
}

pub(crate) fn non_empty(text: String) -> Result<String, LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::Decode("response contained no text".to_string()));
    }
    Ok(text)
}

#[derive(Debug, Deserialize)]
struct AnthropicMessage {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletion {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChat {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}
