use std::time::Duration;

use askforce_core::config::{SalesforceConfig, SalesforceCredentials};
use askforce_core::{Cardinality, DataSource, QueryOutcome, QueryRequest, Record, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

const TOKEN_PATH: &str = "/services/oauth2/token";

/// REST query client for one Salesforce org.
pub struct SalesforceClient {
    client: Client,
    base_url: String,
    api_version: String,
    credentials: SalesforceCredentials,
    max_pages: u32,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

#[derive(Deserialize)]
struct QueryPage {
    records: Vec<Record>,
    #[serde(default = "default_done")]
    done: bool,
    #[serde(default, rename = "nextRecordsUrl")]
    next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

impl SalesforceClient {
    pub fn from_config(config: &SalesforceConfig) -> Result<Self, SourceError> {
        let credentials =
            config.credentials().map_err(|error| SourceError::Configuration(error.to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                SourceError::Configuration(format!("failed to build http client: {error}"))
            })?;

        Ok(Self {
            client,
            base_url: config.instance_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            credentials,
            max_pages: config.max_pages,
        })
    }

    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url)
    }

    pub fn query_url(&self, request: &QueryRequest) -> String {
        format!(
            "{}/services/data/{}/query?q={}",
            self.base_url,
            self.api_version,
            request.encoded_soql()
        )
    }

    /// Password grant; the security token is appended to the password.
    pub async fn authenticate(&self) -> Result<SecretString, SourceError> {
        let credentials = &self.credentials;
        let password = format!(
            "{}{}",
            credentials.password.expose_secret(),
            credentials.security_token.expose_secret()
        );

        let response = self
            .client
            .post(self.token_url())
            .form(&[
                ("grant_type", "password"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
                ("username", credentials.username.as_str()),
                ("password", password.as_str()),
            ])
            .send()
            .await
            .map_err(|error| SourceError::Auth(format!("token request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| SourceError::Auth(format!("token response unreadable: {error}")))?;
        if !status.is_success() {
            warn!(
                event_name = "salesforce.auth.failed",
                status = status.as_u16(),
                body = %body,
                "salesforce authentication failed"
            );
            return Err(SourceError::Auth(body));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|error| SourceError::Auth(format!("failed to decode token response: {error}")))?;
        if token.access_token.is_empty() {
            return Err(SourceError::Auth("token endpoint returned empty access token".to_string()));
        }

        debug!(event_name = "salesforce.auth.succeeded", "obtained access token");
        Ok(SecretString::from(token.access_token))
    }

    async fn fetch(&self, url: &str, token: &SecretString) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token.expose_secret())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|error| SourceError::Query(format!("query request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| SourceError::Query(format!("query response unreadable: {error}")))?;
        if !status.is_success() {
            warn!(
                event_name = "salesforce.query.failed",
                status = status.as_u16(),
                body = %body,
                "salesforce query failed"
            );
            return Err(SourceError::Query(body));
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|error| SourceError::Query(format!("failed to decode query response: {error}")))?;
        if !payload.get("records").is_some_and(Value::is_array) {
            return Err(SourceError::Query("query response has no records array".to_string()));
        }
        Ok(payload)
    }

    async fn fetch_all(&self, first: Value, token: &SecretString) -> Result<Vec<Record>, SourceError> {
        let mut page = parse_page(first)?;
        let mut records = std::mem::take(&mut page.records);
        let mut pages = 1_u32;

        while !page.done {
            let Some(next) = page.next_records_url.take() else {
                break;
            };
            if pages >= self.max_pages {
                warn!(
                    event_name = "salesforce.query.truncated",
                    pages,
                    records = records.len(),
                    "stopped following nextRecordsUrl at the page limit"
                );
                break;
            }

            let url = format!("{}{next}", self.base_url);
            page = parse_page(self.fetch(&url, token).await?)?;
            records.append(&mut page.records);
            pages += 1;
        }

        Ok(records)
    }
}

fn parse_page(payload: Value) -> Result<QueryPage, SourceError> {
    serde_json::from_value(payload)
        .map_err(|error| SourceError::Query(format!("unexpected query response shape: {error}")))
}

#[async_trait]
impl DataSource for SalesforceClient {
    async fn execute(&self, request: &QueryRequest) -> Result<QueryOutcome, SourceError> {
        let token = self.authenticate().await?;

        info!(
            event_name = "salesforce.query.start",
            table = request.table(),
            cardinality = ?request.cardinality(),
            "running soql query"
        );
        let first = self.fetch(&self.query_url(request), &token).await?;

        let outcome = match request.cardinality() {
            Cardinality::Envelope => QueryOutcome::Envelope(first),
            Cardinality::One => QueryOutcome::First(parse_page(first)?.records.into_iter().next()),
            Cardinality::All => QueryOutcome::Records(self.fetch_all(first, &token).await?),
        };

        info!(
            event_name = "salesforce.query.completed",
            table = request.table(),
            records = outcome.record_count(),
            "soql query completed"
        );
        Ok(outcome)
    }
}
