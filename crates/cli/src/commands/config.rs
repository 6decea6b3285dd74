use std::env;
use std::fs;
use std::path::Path;

use askforce_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::SecretString;
use toml::Value;

use super::{load_config, CommandResult};

struct ConfigLine {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl ConfigLine {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for line in effective_lines(&config) {
        let source = field_source(
            line.key,
            line.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(line.key, &line.value, source));
    }

    CommandResult::text(lines.join("\n"))
}

fn effective_lines(config: &AppConfig) -> Vec<ConfigLine> {
    let salesforce = &config.salesforce;
    let llm = &config.llm;
    let pipeline = &config.pipeline;

    vec![
        ConfigLine::new(
            "salesforce.instance_url",
            &salesforce.instance_url,
            &["ASKFORCE_SALESFORCE_INSTANCE_URL", "SF_INSTANCE_URL"],
        ),
        ConfigLine::new(
            "salesforce.api_version",
            &salesforce.api_version,
            &["ASKFORCE_SALESFORCE_API_VERSION", "SF_API_VERSION"],
        ),
        ConfigLine::new(
            "salesforce.client_id",
            salesforce.client_id.as_deref().unwrap_or("<unset>"),
            &["ASKFORCE_SALESFORCE_CLIENT_ID", "SF_CLIENT_ID"],
        ),
        ConfigLine::new(
            "salesforce.client_secret",
            redact_secret(salesforce.client_secret.as_ref()),
            &["ASKFORCE_SALESFORCE_CLIENT_SECRET", "SF_CLIENT_SECRET"],
        ),
        ConfigLine::new(
            "salesforce.username",
            salesforce.username.as_deref().unwrap_or("<unset>"),
            &["ASKFORCE_SALESFORCE_USERNAME", "SF_USERNAME"],
        ),
        ConfigLine::new(
            "salesforce.password",
            redact_secret(salesforce.password.as_ref()),
            &["ASKFORCE_SALESFORCE_PASSWORD", "SF_PASSWORD"],
        ),
        ConfigLine::new(
            "salesforce.security_token",
            redact_secret(salesforce.security_token.as_ref()),
            &["ASKFORCE_SALESFORCE_SECURITY_TOKEN", "SF_SECURITY_TOKEN"],
        ),
        ConfigLine::new(
            "salesforce.timeout_secs",
            salesforce.timeout_secs.to_string(),
            &["ASKFORCE_SALESFORCE_TIMEOUT_SECS"],
        ),
        ConfigLine::new(
            "salesforce.max_pages",
            salesforce.max_pages.to_string(),
            &["ASKFORCE_SALESFORCE_MAX_PAGES"],
        ),
        ConfigLine::new("llm.provider", format!("{:?}", llm.provider), &["ASKFORCE_LLM_PROVIDER"]),
        ConfigLine::new("llm.model", &llm.model, &["ASKFORCE_LLM_MODEL"]),
        ConfigLine::new("llm.region", &llm.region, &["ASKFORCE_LLM_REGION"]),
        ConfigLine::new(
            "llm.bedrock_model_id",
            &llm.bedrock_model_id,
            &["ASKFORCE_LLM_BEDROCK_MODEL_ID"],
        ),
        ConfigLine::new(
            "llm.base_url",
            llm.base_url.as_deref().unwrap_or("<unset>"),
            &["ASKFORCE_LLM_BASE_URL"],
        ),
        ConfigLine::new("llm.api_key", redact_secret(llm.api_key.as_ref()), &["ASKFORCE_LLM_API_KEY"]),
        ConfigLine::new(
            "llm.timeout_secs",
            llm.timeout_secs.to_string(),
            &["ASKFORCE_LLM_TIMEOUT_SECS"],
        ),
        ConfigLine::new(
            "llm.temperature",
            llm.temperature.to_string(),
            &["ASKFORCE_LLM_TEMPERATURE"],
        ),
        ConfigLine::new("llm.max_tokens", llm.max_tokens.to_string(), &["ASKFORCE_LLM_MAX_TOKENS"]),
        ConfigLine::new(
            "pipeline.default_table",
            &pipeline.default_table,
            &["ASKFORCE_PIPELINE_DEFAULT_TABLE"],
        ),
        ConfigLine::new(
            "pipeline.fetch_all",
            pipeline.fetch_all.to_string(),
            &["ASKFORCE_PIPELINE_FETCH_ALL"],
        ),
        ConfigLine::new(
            "pipeline.field_validation",
            format!("{:?}", pipeline.field_validation),
            &["ASKFORCE_PIPELINE_FIELD_VALIDATION"],
        ),
        ConfigLine::new(
            "schemas",
            config.schemas.tables().collect::<Vec<_>>().join(", "),
            &[],
        ),
        ConfigLine::new(
            "logging.level",
            &config.logging.level,
            &["ASKFORCE_LOGGING_LEVEL", "ASKFORCE_LOG_LEVEL"],
        ),
        ConfigLine::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["ASKFORCE_LOGGING_FORMAT", "ASKFORCE_LOG_FORMAT"],
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use askforce_core::config::AppConfig;
    use toml::Value;

    use super::{contains_path, effective_lines, field_source};

    #[test]
    fn secrets_never_render_in_clear() {
        let mut config = AppConfig::default();
        config.salesforce.password = Some("hunter2".to_string().into());
        config.llm.api_key = Some("sk-live-secret".to_string().into());

        let lines = effective_lines(&config);
        let rendered: Vec<_> = lines.iter().map(|line| line.value.as_str()).collect();

        assert!(!rendered.iter().any(|value| value.contains("hunter2")));
        assert!(!rendered.iter().any(|value| value.contains("sk-live")));
        let password = lines.iter().find(|line| line.key == "salesforce.password").expect("line");
        assert_eq!(password.value, "<redacted>");
        let token = lines.iter().find(|line| line.key == "salesforce.security_token").expect("line");
        assert_eq!(token.value, "<unset>");
    }

    #[test]
    fn file_keys_are_attributed_to_the_file() {
        let doc = "[salesforce]\napi_version = \"v58.0\"\n".parse::<Value>().expect("toml");
        let path = Path::new("askforce.toml");

        assert!(contains_path(&doc, "salesforce.api_version"));
        assert_eq!(
            field_source("salesforce.api_version", &[], Some(&doc), Some(path)),
            "file (askforce.toml)"
        );
        assert_eq!(field_source("llm.model", &[], Some(&doc), Some(path)), "default");
    }
}
