use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SourceError;
use crate::query::QueryRequest;

/// One row as returned by the store, field order preserved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Object type from the `attributes` block Salesforce attaches to each record.
    pub fn object_type(&self) -> Option<&str> {
        self.0.get("attributes")?.get("type")?.as_str()
    }

    /// Data fields, without the `attributes` block.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().filter(|(key, _)| key.as_str() != "attributes").map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Result of executing a [`QueryRequest`], shaped by its cardinality.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    First(Option<Record>),
    Records(Vec<Record>),
    Envelope(Value),
    /// The remote call failed and the failure was logged.
    Unavailable,
}

impl QueryOutcome {
    pub fn record_count(&self) -> usize {
        match self {
            Self::First(record) => usize::from(record.is_some()),
            Self::Records(records) => records.len(),
            Self::Envelope(envelope) => {
                envelope.get("records").and_then(Value::as_array).map_or(0, Vec::len)
            }
            Self::Unavailable => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// JSON form handed to the summarizer; `null` when there is nothing to show.
    pub fn to_json(&self) -> Value {
        match self {
            Self::First(Some(record)) => Value::Object(record.0.clone()),
            Self::First(None) | Self::Unavailable => Value::Null,
            Self::Records(records) => {
                Value::Array(records.iter().map(|record| Value::Object(record.0.clone())).collect())
            }
            Self::Envelope(envelope) => envelope.clone(),
        }
    }
}

/// Executes rendered queries against the remote store.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn execute(&self, request: &QueryRequest) -> Result<QueryOutcome, SourceError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{QueryOutcome, Record};

    fn record() -> Record {
        serde_json::from_value(json!({
            "attributes": {"type": "PNEX__DUPIXENT__c", "url": "/services/data/v54.0/sobjects/PNEX__DUPIXENT__c/a2e1"},
            "PNEX__Copay_Balance_Bylvay__c": 30.0
        }))
        .expect("record")
    }

    #[test]
    fn record_exposes_type_and_data_fields() {
        let record = record();

        assert_eq!(record.object_type(), Some("PNEX__DUPIXENT__c"));
        assert_eq!(
            record.fields().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["PNEX__Copay_Balance_Bylvay__c"]
        );
        assert_eq!(record.get("PNEX__Copay_Balance_Bylvay__c"), Some(&json!(30.0)));
    }

    #[test]
    fn outcome_counts_records_for_each_shape() {
        assert_eq!(QueryOutcome::First(Some(record())).record_count(), 1);
        assert_eq!(QueryOutcome::First(None).record_count(), 0);
        assert_eq!(QueryOutcome::Records(vec![record(), record()]).record_count(), 2);
        assert_eq!(
            QueryOutcome::Envelope(json!({"totalSize": 1, "done": true, "records": [{}]}))
                .record_count(),
            1
        );
        assert!(QueryOutcome::Unavailable.is_empty());
    }

    #[test]
    fn missing_data_renders_as_null() {
        assert!(QueryOutcome::Unavailable.to_json().is_null());
        assert!(QueryOutcome::First(None).to_json().is_null());
        assert_eq!(QueryOutcome::Records(Vec::new()).to_json(), json!([]));
    }
}
