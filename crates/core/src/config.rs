use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{SchemaEntry, SchemaRegistry, DUPIXENT_TABLE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub salesforce: SalesforceConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub schemas: Arc<SchemaRegistry>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SalesforceConfig {
    pub instance_url: String,
    pub api_version: String,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub security_token: Option<SecretString>,
    pub timeout_secs: u64,
    pub max_pages: u32,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    /// AWS region of the Bedrock runtime endpoint.
    pub region: String,
    /// Model id used instead of `model` when the provider is Bedrock.
    pub bedrock_model_id: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub default_table: String,
    pub fetch_all: bool,
    pub field_validation: FieldValidation,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
    Bedrock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// How extracted field names are checked against the schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValidation {
    /// Unknown fields are logged and passed through.
    #[default]
    Advisory,
    /// Unknown fields fail extraction.
    Strict,
}

/// Salesforce password-grant credentials, all present.
#[derive(Clone, Debug)]
pub struct SalesforceCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
    pub security_token: SecretString,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub default_table: Option<String>,
    pub salesforce_instance_url: Option<String>,
    pub salesforce_api_version: Option<String>,
    pub salesforce_client_id: Option<String>,
    pub salesforce_client_secret: Option<String>,
    pub salesforce_username: Option<String>,
    pub salesforce_password: Option<String>,
    pub salesforce_security_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            salesforce: SalesforceConfig {
                instance_url: "https://login.salesforce.com".to_string(),
                api_version: "v54.0".to_string(),
                client_id: None,
                client_secret: None,
                username: None,
                password: None,
                security_token: None,
                timeout_secs: 30,
                max_pages: 10,
            },
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: None,
                base_url: None,
                model: "claude-3-5-sonnet-20240620".to_string(),
                region: "us-east-1".to_string(),
                bedrock_model_id: "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string(),
                timeout_secs: 60,
                temperature: 0.3,
                max_tokens: 512,
            },
            pipeline: PipelineConfig {
                default_table: DUPIXENT_TABLE.to_string(),
                fetch_all: true,
                field_validation: FieldValidation::Advisory,
            },
            schemas: Arc::new(SchemaRegistry::builtin()),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "bedrock" => Ok(Self::Bedrock),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama|bedrock)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for FieldValidation {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::Validation(format!(
                "unsupported field validation `{other}` (expected advisory|strict)"
            ))),
        }
    }
}

impl SalesforceConfig {
    pub fn credentials(&self) -> Result<SalesforceCredentials, ConfigError> {
        let mut missing = Vec::new();
        if is_blank(self.client_id.as_deref()) {
            missing.push("salesforce.client_id");
        }
        if is_blank_secret(self.client_secret.as_ref()) {
            missing.push("salesforce.client_secret");
        }
        if is_blank(self.username.as_deref()) {
            missing.push("salesforce.username");
        }
        if is_blank_secret(self.password.as_ref()) {
            missing.push("salesforce.password");
        }

        match (
            &self.client_id,
            &self.client_secret,
            &self.username,
            &self.password,
            missing.is_empty(),
        ) {
            (Some(client_id), Some(client_secret), Some(username), Some(password), true) => {
                Ok(SalesforceCredentials {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    username: username.clone(),
                    password: password.clone(),
                    // Orgs with trusted IP ranges issue no security token.
                    security_token: self
                        .security_token
                        .clone()
                        .unwrap_or_else(|| secret_value(String::new())),
                })
            }
            _ => Err(ConfigError::Validation(format!(
                "salesforce credentials are incomplete; missing {}",
                missing.join(", ")
            ))),
        }
    }
}

impl LlmConfig {
    pub fn requires_api_key(&self) -> bool {
        matches!(self.provider, LlmProvider::OpenAi | LlmProvider::Anthropic)
    }

    /// Bedrock takes its own model id; every other provider uses `model`.
    pub fn model_id(&self) -> &str {
        match self.provider {
            LlmProvider::Bedrock => &self.bedrock_model_id,
            _ => &self.model,
        }
    }

    pub fn api_key(&self) -> Result<Option<&SecretString>, ConfigError> {
        if self.requires_api_key() && is_blank_secret(self.api_key.as_ref()) {
            return Err(ConfigError::Validation(
                "llm.api_key is required for openai/anthropic providers".to_string(),
            ));
        }
        Ok(self.api_key.as_ref())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("askforce.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(salesforce) = patch.salesforce {
            if let Some(instance_url) = salesforce.instance_url {
                self.salesforce.instance_url = instance_url;
            }
            if let Some(api_version) = salesforce.api_version {
                self.salesforce.api_version = api_version;
            }
            if let Some(client_id) = salesforce.client_id {
                self.salesforce.client_id = Some(client_id);
            }
            if let Some(client_secret_value) = salesforce.client_secret {
                self.salesforce.client_secret = Some(secret_value(client_secret_value));
            }
            if let Some(username) = salesforce.username {
                self.salesforce.username = Some(username);
            }
            if let Some(password_value) = salesforce.password {
                self.salesforce.password = Some(secret_value(password_value));
            }
            if let Some(security_token_value) = salesforce.security_token {
                self.salesforce.security_token = Some(secret_value(security_token_value));
            }
            if let Some(timeout_secs) = salesforce.timeout_secs {
                self.salesforce.timeout_secs = timeout_secs;
            }
            if let Some(max_pages) = salesforce.max_pages {
                self.salesforce.max_pages = max_pages;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(region) = llm.region {
                self.llm.region = region;
            }
            if let Some(bedrock_model_id) = llm.bedrock_model_id {
                self.llm.bedrock_model_id = bedrock_model_id;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(default_table) = pipeline.default_table {
                self.pipeline.default_table = default_table;
            }
            if let Some(fetch_all) = pipeline.fetch_all {
                self.pipeline.fetch_all = fetch_all;
            }
            if let Some(field_validation) = pipeline.field_validation {
                self.pipeline.field_validation = field_validation;
            }
        }

        if let Some(schemas) = patch.schemas {
            let entries = schemas
                .into_iter()
                .map(|(table, fields)| SchemaEntry::new(table, fields))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| ConfigError::Validation(format!("schemas: {error}")))?;
            self.schemas = Arc::new(self.schemas.extended(entries));
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_any(&["ASKFORCE_SALESFORCE_INSTANCE_URL", "SF_INSTANCE_URL"]) {
            self.salesforce.instance_url = value;
        }
        if let Some(value) = read_env_any(&["ASKFORCE_SALESFORCE_API_VERSION", "SF_API_VERSION"]) {
            self.salesforce.api_version = value;
        }
        if let Some(value) = read_env_any(&["ASKFORCE_SALESFORCE_CLIENT_ID", "SF_CLIENT_ID"]) {
            self.salesforce.client_id = Some(value);
        }
        if let Some(value) =
            read_env_any(&["ASKFORCE_SALESFORCE_CLIENT_SECRET", "SF_CLIENT_SECRET"])
        {
            self.salesforce.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env_any(&["ASKFORCE_SALESFORCE_USERNAME", "SF_USERNAME"]) {
            self.salesforce.username = Some(value);
        }
        if let Some(value) = read_env_any(&["ASKFORCE_SALESFORCE_PASSWORD", "SF_PASSWORD"]) {
            self.salesforce.password = Some(secret_value(value));
        }
        if let Some(value) =
            read_env_any(&["ASKFORCE_SALESFORCE_SECURITY_TOKEN", "SF_SECURITY_TOKEN"])
        {
            self.salesforce.security_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ASKFORCE_SALESFORCE_TIMEOUT_SECS") {
            self.salesforce.timeout_secs = parse_u64("ASKFORCE_SALESFORCE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ASKFORCE_SALESFORCE_MAX_PAGES") {
            self.salesforce.max_pages = parse_u32("ASKFORCE_SALESFORCE_MAX_PAGES", &value)?;
        }

        if let Some(value) = read_env("ASKFORCE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("ASKFORCE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ASKFORCE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("ASKFORCE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ASKFORCE_LLM_REGION") {
            self.llm.region = value;
        }
        if let Some(value) = read_env("ASKFORCE_LLM_BEDROCK_MODEL_ID") {
            self.llm.bedrock_model_id = value;
        }
        if let Some(value) = read_env("ASKFORCE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ASKFORCE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ASKFORCE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("ASKFORCE_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("ASKFORCE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("ASKFORCE_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("ASKFORCE_PIPELINE_DEFAULT_TABLE") {
            self.pipeline.default_table = value;
        }
        if let Some(value) = read_env("ASKFORCE_PIPELINE_FETCH_ALL") {
            self.pipeline.fetch_all = parse_bool("ASKFORCE_PIPELINE_FETCH_ALL", &value)?;
        }
        if let Some(value) = read_env("ASKFORCE_PIPELINE_FIELD_VALIDATION") {
            self.pipeline.field_validation = value.parse()?;
        }

        let log_level =
            read_env("ASKFORCE_LOGGING_LEVEL").or_else(|| read_env("ASKFORCE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ASKFORCE_LOGGING_FORMAT").or_else(|| read_env("ASKFORCE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(default_table) = overrides.default_table {
            self.pipeline.default_table = default_table;
        }

        if let Some(instance_url) = overrides.salesforce_instance_url {
            self.salesforce.instance_url = instance_url;
        }
        if let Some(api_version) = overrides.salesforce_api_version {
            self.salesforce.api_version = api_version;
        }
        if let Some(client_id) = overrides.salesforce_client_id {
            self.salesforce.client_id = Some(client_id);
        }
        if let Some(client_secret) = overrides.salesforce_client_secret {
            self.salesforce.client_secret = Some(secret_value(client_secret));
        }
        if let Some(username) = overrides.salesforce_username {
            self.salesforce.username = Some(username);
        }
        if let Some(password) = overrides.salesforce_password {
            self.salesforce.password = Some(secret_value(password));
        }
        if let Some(security_token) = overrides.salesforce_security_token {
            self.salesforce.security_token = Some(secret_value(security_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_salesforce(&self.salesforce)?;
        validate_llm(&self.llm)?;
        validate_pipeline(&self.pipeline, &self.schemas)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("askforce.toml"), PathBuf::from("config/askforce.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_salesforce(salesforce: &SalesforceConfig) -> Result<(), ConfigError> {
    let url = salesforce.instance_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "salesforce.instance_url must start with http:// or https://".to_string(),
        ));
    }

    let version = salesforce.api_version.trim();
    let numeric = version.strip_prefix('v').unwrap_or_default();
    if numeric.is_empty() || numeric.parse::<f32>().is_err() {
        return Err(ConfigError::Validation(format!(
            "salesforce.api_version must look like `v54.0` (got `{version}`)"
        )));
    }

    if salesforce.timeout_secs == 0 || salesforce.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "salesforce.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if salesforce.max_pages == 0 {
        return Err(ConfigError::Validation(
            "salesforce.max_pages must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 || llm.max_tokens > 4096 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be in range 1..=4096".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.provider == LlmProvider::Bedrock {
        if llm.region.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.region is required for bedrock provider".to_string(),
            ));
        }
        if llm.bedrock_model_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.bedrock_model_id must not be empty".to_string(),
            ));
        }
    }

    if llm.provider == LlmProvider::Ollama && is_blank(llm.base_url.as_deref()) {
        return Err(ConfigError::Validation(
            "llm.base_url is required for ollama provider".to_string(),
        ));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig, schemas: &SchemaRegistry) -> Result<(), ConfigError> {
    if !schemas.contains_table(&pipeline.default_table) {
        let known = schemas.tables().collect::<Vec<_>>().join(", ");
        return Err(ConfigError::Validation(format!(
            "pipeline.default_table `{}` is not a registered schema (known: {known})",
            pipeline.default_table
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|value| value.trim().is_empty()).unwrap_or(true)
}

fn is_blank_secret(value: Option<&SecretString>) -> bool {
    value.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    salesforce: Option<SalesforcePatch>,
    llm: Option<LlmPatch>,
    pipeline: Option<PipelinePatch>,
    schemas: Option<BTreeMap<String, Vec<String>>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SalesforcePatch {
    instance_url: Option<String>,
    api_version: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    username: Option<String>,
    password: Option<String>,
    security_token: Option<String>,
    timeout_secs: Option<u64>,
    max_pages: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    region: Option<String>,
    bedrock_model_id: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    default_table: Option<String>,
    fetch_all: Option<bool>,
    field_validation: Option<FieldValidation>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, FieldValidation, LlmProvider, LoadOptions,
        LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const SALESFORCE_VARS: [&str; 7] = [
        "SF_INSTANCE_URL",
        "SF_CLIENT_ID",
        "SF_CLIENT_SECRET",
        "SF_USERNAME",
        "SF_PASSWORD",
        "SF_SECURITY_TOKEN",
        "ASKFORCE_SALESFORCE_INSTANCE_URL",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("askforce.toml");
        fs::write(&path, body).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_target_the_patient_services_org() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&SALESFORCE_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.salesforce.api_version == "v54.0", "default api version should be v54.0")?;
        ensure(config.pipeline.default_table == "PNEX__DUPIXENT__c", "default table")?;
        ensure(config.pipeline.fetch_all, "pipeline should fetch all records by default")?;
        ensure(config.llm.provider == LlmProvider::Anthropic, "anthropic is the default")?;
        ensure((config.llm.temperature - 0.3).abs() < f32::EPSILON, "temperature 0.3")?;
        ensure(config.llm.max_tokens == 512, "max tokens 512")?;
        ensure(config.schemas.len() == 2, "two built-in schemas")
    }

    #[test]
    fn legacy_salesforce_env_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SF_INSTANCE_URL", "https://example.my.salesforce.com");
        env::set_var("SF_CLIENT_ID", "client-id");
        env::set_var("SF_CLIENT_SECRET", "client-secret");
        env::set_var("SF_USERNAME", "ops@example.com");
        env::set_var("SF_PASSWORD", "hunter2");
        env::set_var("SF_SECURITY_TOKEN", "tok123");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let credentials = config
                .salesforce
                .credentials()
                .map_err(|err| format!("credentials should be complete: {err}"))?;

            ensure(
                config.salesforce.instance_url == "https://example.my.salesforce.com",
                "instance url should come from SF_INSTANCE_URL",
            )?;
            ensure(credentials.username == "ops@example.com", "username from SF_USERNAME")?;
            ensure(credentials.password.expose_secret() == "hunter2", "password from env")?;
            ensure(
                credentials.security_token.expose_secret() == "tok123",
                "security token from SF_SECURITY_TOKEN",
            )
        })();

        clear_vars(&SALESFORCE_VARS);
        result
    }

    #[test]
    fn prefixed_env_names_win_over_legacy_names() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SF_INSTANCE_URL", "https://legacy.my.salesforce.com");
        env::set_var("ASKFORCE_SALESFORCE_INSTANCE_URL", "https://prefixed.my.salesforce.com");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.salesforce.instance_url == "https://prefixed.my.salesforce.com",
                "prefixed variable should win",
            )
        })();

        clear_vars(&SALESFORCE_VARS);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation_and_schemas() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&SALESFORCE_VARS);
        env::set_var("TEST_SF_PASSWORD", "from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[salesforce]
client_id = "cid"
client_secret = "csecret"
username = "ops@example.com"
password = "${TEST_SF_PASSWORD}"

[pipeline]
default_table = "Case"
field_validation = "strict"

[schemas]
Case = ["Id", "Subject", "Status"]
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;
            let credentials = config
                .salesforce
                .credentials()
                .map_err(|err| format!("credentials should be complete: {err}"))?;

            ensure(credentials.password.expose_secret() == "from-env", "interpolated password")?;
            ensure(
                credentials.security_token.expose_secret().is_empty(),
                "missing security token should default to empty",
            )?;
            ensure(config.schemas.contains_field("Case", "Subject"), "file schema registered")?;
            ensure(
                config.schemas.contains_table("PNEX__DUPIXENT__c"),
                "built-in schemas should survive file entries",
            )?;
            ensure(
                config.pipeline.field_validation == FieldValidation::Strict,
                "strict validation from file",
            )
        })();

        clear_vars(&["TEST_SF_PASSWORD"]);
        result
    }

    #[test]
    fn invalid_schema_entries_fail_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, "[schemas]\nCase = [\"Id\", \"Id\"]\n")?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected schema validation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("`Id`")),
            "validation failure should name the duplicated field",
        )
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&SALESFORCE_VARS);
        env::set_var("ASKFORCE_LOG_LEVEL", "warn");
        env::set_var("ASKFORCE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[salesforce]
api_version = "v60.0"

[logging]
level = "error"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    salesforce_api_version: Some("v61.0".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.salesforce.api_version == "v61.0", "override should win")?;
            ensure(config.logging.level == "warn", "env should win over file")?;
            ensure(matches!(config.logging.format, LogFormat::Pretty), "pretty format from env")
        })();

        clear_vars(&["ASKFORCE_LOG_LEVEL", "ASKFORCE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn bedrock_provider_needs_no_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        env::set_var("ASKFORCE_LLM_PROVIDER", "bedrock");
        env::set_var("ASKFORCE_LLM_REGION", "eu-central-1");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::Bedrock, "bedrock from env")?;
            ensure(config.llm.region == "eu-central-1", "region from env")?;
            ensure(
                config.llm.model_id() == "anthropic.claude-3-5-sonnet-20240620-v1:0",
                "bedrock uses its own model id",
            )?;
            ensure(!config.llm.requires_api_key(), "bedrock signs with aws credentials")?;
            ensure(config.llm.api_key().is_ok(), "missing api key is fine for bedrock")
        })();

        clear_vars(&["ASKFORCE_LLM_PROVIDER", "ASKFORCE_LLM_REGION"]);
        result
    }

    #[test]
    fn unknown_default_table_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                default_table: Some("Opportunity".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("pipeline.default_table")),
            "validation failure should mention pipeline.default_table",
        )
    }

    #[test]
    fn incomplete_credentials_name_missing_keys() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&SALESFORCE_VARS);

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                salesforce_client_id: Some("cid".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        let message = match config.salesforce.credentials() {
            Ok(_) => return Err("credentials should be incomplete".to_string()),
            Err(error) => error.to_string(),
        };
        ensure(message.contains("salesforce.username"), "username should be listed")?;
        ensure(!message.contains("salesforce.client_id"), "client id is present")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&SALESFORCE_VARS);

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                salesforce_client_secret: Some("client-secret-value".to_string()),
                salesforce_password: Some("password-value".to_string()),
                salesforce_security_token: Some("token-value".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("client-secret-value"), "client secret should be redacted")?;
        ensure(!debug.contains("password-value"), "password should be redacted")?;
        ensure(!debug.contains("token-value"), "security token should be redacted")
    }
}
