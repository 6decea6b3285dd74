//! Structured output of the extraction step.
//!
//! The model is asked for a JSON object with exactly three keys:
//!
//! ```json
//! {
//!   "column_names": ["PNEX__Copay_Balance_Bylvay__c"],
//!   "condition_columns_name": ["PNEX__Patient_Id_Bylvay__c"],
//!   "condition_columns_values": ["P005"]
//! }
//! ```
//!
//! [`Extraction::from_model_output`] is the only way raw model text becomes an
//! [`Extraction`]. Anything that does not match the contract is rejected; nothing is
//! repaired.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::errors::ExtractionParseError;
use crate::schema::SchemaRegistry;

pub const TARGET_FIELDS_KEY: &str = "column_names";
pub const CONDITION_FIELDS_KEY: &str = "condition_columns_name";
pub const CONDITION_VALUES_KEY: &str = "condition_columns_values";

/// Right-hand side of an equality predicate.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Boolean(bool),
    Number(Number),
    Text(String),
}

impl ConditionValue {
    /// `None` for NaN and infinities, which have no JSON form.
    pub fn float(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Self::Number)
    }

    fn from_json(index: usize, value: &Value) -> Result<Self, ExtractionParseError> {
        match value {
            Value::String(text) => Ok(Self::Text(text.clone())),
            Value::Number(number) => Ok(Self::Number(number.clone())),
            Value::Bool(flag) => Ok(Self::Boolean(*flag)),
            Value::Null => Err(ExtractionParseError::UnsupportedValue { index, kind: "null" }),
            Value::Array(_) => Err(ExtractionParseError::UnsupportedValue { index, kind: "array" }),
            Value::Object(_) => {
                Err(ExtractionParseError::UnsupportedValue { index, kind: "object" })
            }
        }
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(flag) => write!(f, "{flag}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Extraction {
    target_fields: Vec<String>,
    condition_fields: Vec<String>,
    condition_values: Vec<ConditionValue>,
}

impl Extraction {
    pub fn new(
        target_fields: Vec<String>,
        condition_fields: Vec<String>,
        condition_values: Vec<ConditionValue>,
    ) -> Result<Self, ExtractionParseError> {
        if condition_fields.len() != condition_values.len() {
            return Err(ExtractionParseError::LengthMismatch {
                fields: condition_fields.len(),
                values: condition_values.len(),
            });
        }

        Ok(Self { target_fields, condition_fields, condition_values })
    }

    /// Convenience constructor for `(field, value)` pairs.
    pub fn from_pairs<F, C, V>(
        target_fields: impl IntoIterator<Item = F>,
        conditions: impl IntoIterator<Item = (C, V)>,
    ) -> Self
    where
        F: Into<String>,
        C: Into<String>,
        V: Into<ConditionValue>,
    {
        let (condition_fields, condition_values) =
            conditions.into_iter().map(|(field, value)| (field.into(), value.into())).unzip();

        Self {
            target_fields: target_fields.into_iter().map(Into::into).collect(),
            condition_fields,
            condition_values,
        }
    }

    pub fn from_model_output(raw: &str) -> Result<Self, ExtractionParseError> {
        let value = serde_json::from_str::<Value>(raw.trim())
            .map_err(|error| ExtractionParseError::InvalidJson(error.to_string()))?;
        let Value::Object(object) = value else {
            return Err(ExtractionParseError::NotAnObject);
        };

        let target_fields = string_list(&object, TARGET_FIELDS_KEY)?;
        let condition_fields = string_list(&object, CONDITION_FIELDS_KEY)?;
        let condition_values = required_array(&object, CONDITION_VALUES_KEY)?
            .iter()
            .enumerate()
            .map(|(index, value)| ConditionValue::from_json(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(target_fields, condition_fields, condition_values)
    }

    pub fn target_fields(&self) -> &[String] {
        &self.target_fields
    }

    pub fn condition_fields(&self) -> &[String] {
        &self.condition_fields
    }

    pub fn condition_values(&self) -> &[ConditionValue] {
        &self.condition_values
    }

    /// Condition pairs in the order the model returned them.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &ConditionValue)> {
        self.condition_fields.iter().map(String::as_str).zip(self.condition_values.iter())
    }

    /// Fields (target or condition) that the table does not expose.
    pub fn unknown_fields<'a>(
        &'a self,
        schemas: &'a SchemaRegistry,
        table: &'a str,
    ) -> impl Iterator<Item = &'a str> {
        self.target_fields
            .iter()
            .chain(self.condition_fields.iter())
            .map(String::as_str)
            .filter(move |field| !schemas.contains_field(table, field))
    }
}

fn required_array<'a>(
    object: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a Vec<Value>, ExtractionParseError> {
    match object.get(key) {
        None => Err(ExtractionParseError::MissingKey(key)),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ExtractionParseError::InvalidType { key, expected: "an array" }),
    }
}

fn string_list(
    object: &Map<String, Value>,
    key: &'static str,
) -> Result<Vec<String>, ExtractionParseError> {
    required_array(object, key)?
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or(ExtractionParseError::InvalidType {
                key,
                expected: "an array of strings",
            })
        })
        .collect()
}
