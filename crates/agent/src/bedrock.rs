//! Bedrock runtime client over the AWS SDK Converse API.

use std::time::Duration;

use askforce_core::config::LlmConfig;
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::config::{Credentials, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, InferenceConfiguration, Message,
};
use aws_sdk_bedrockruntime::Client;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::providers::non_empty;

/// Signs requests with the AWS default credential chain (`AWS_ACCESS_KEY_ID` and
/// `AWS_SECRET_ACCESS_KEY`, shared profiles, instance roles). The SDK client is built on
/// the first request because loading that chain is async.
pub struct BedrockLlmClient {
    region: String,
    model_id: String,
    endpoint_url: Option<String>,
    timeout: Duration,
    credentials: Option<Credentials>,
    client: OnceCell<Client>,
}

impl BedrockLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let region = config.region.trim();
        if region.is_empty() {
            return Err(LlmError::Configuration(
                "llm.region is required for bedrock provider".to_string(),
            ));
        }

        Ok(Self {
            region: region.to_string(),
            model_id: config.bedrock_model_id.clone(),
            endpoint_url: config.base_url.as_ref().map(|url| url.trim_end_matches('/').to_string()),
            timeout: Duration::from_secs(config.timeout_secs),
            credentials: None,
            client: OnceCell::new(),
        })
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.region.clone()))
                    .timeout_config(
                        TimeoutConfig::builder().operation_timeout(self.timeout).build(),
                    );
                if let Some(endpoint_url) = &self.endpoint_url {
                    loader = loader.endpoint_url(endpoint_url.clone());
                }
                if let Some(credentials) = &self.credentials {
                    loader = loader.credentials_provider(credentials.clone());
                }
                Client::new(&loader.load().await)
            })
            .await
    }
}

#[async_trait]
impl LlmClient for BedrockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!(
            event_name = "llm.request.start",
            provider = "bedrock",
            model = %self.model_id,
            region = %self.region,
            prompt_chars = request.prompt.len(),
            "sending converse request"
        );

        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(request.prompt.clone()))
            .build()
            .map_err(|error| LlmError::Prompt(error.to_string()))?;
        let inference = InferenceConfiguration::builder()
            .temperature(request.options.temperature)
            .max_tokens(i32::try_from(request.options.max_tokens).unwrap_or(i32::MAX))
            .build();

        let response = self
            .client()
            .await
            .converse()
            .model_id(&self.model_id)
            .messages(message)
            .inference_config(inference)
            .send()
            .await
            .map_err(|error| {
                let detail = DisplayErrorContext(&error).to_string();
                match error.raw_response() {
                    Some(raw) => LlmError::Status { status: raw.status().as_u16(), body: detail },
                    None => LlmError::Transport(detail),
                }
            })?;

        let text = match response.output() {
            Some(ConverseOutput::Message(message)) => message
                .content()
                .iter()
                .filter_map(|block| block.as_text().ok())
                .map(String::as_str)
                .collect::<String>(),
            _ => String::new(),
        };
        non_empty(text)
    }
}
