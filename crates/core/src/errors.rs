use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown table `{0}`")]
    UnknownTable(String),
    #[error("schema entry has an empty table name")]
    EmptyTableName,
    #[error("schema entry `{table}` has no fields")]
    EmptyFieldList { table: String },
    #[error("schema entry `{table}` lists field `{field}` more than once")]
    DuplicateField { table: String, field: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionParseError {
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("model output must be a JSON object")]
    NotAnObject,
    #[error("model output is missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("`{key}` must be {expected}")]
    InvalidType { key: &'static str, expected: &'static str },
    #[error("condition value at index {index} has unsupported type {kind}")]
    UnsupportedValue { index: usize, kind: &'static str },
    #[error("{fields} condition fields but {values} condition values")]
    LengthMismatch { fields: usize, values: usize },
    #[error("field `{field}` is not registered for table `{table}`")]
    UnknownField { table: String, field: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("at least one target field is required")]
    EmptyProjection,
    #[error("fetch one and fetch all cannot both be requested")]
    ConflictingCardinality,
}

/// Failures at the remote data API boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("data source is not configured: {0}")]
    Configuration(String),
}

impl SourceError {
    /// Auth and query failures are degraded to "no data" by the pipeline.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Query(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Extraction(#[from] ExtractionParseError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("text generation failure: {0}")]
    Generation(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Schema(SchemaError::UnknownTable(_))
            | Self::Query(QueryError::Schema(SchemaError::UnknownTable(_))) => "unknown_table",
            Self::Schema(_) | Self::Query(QueryError::Schema(_)) => "schema_validation",
            Self::Extraction(_) => "extraction_parse",
            Self::Query(QueryError::EmptyProjection) => "empty_projection",
            Self::Query(QueryError::ConflictingCardinality) => "conflicting_cardinality",
            Self::Source(SourceError::Auth(_)) => "auth_failure",
            Self::Source(SourceError::Query(_)) => "query_failure",
            Self::Source(SourceError::Configuration(_)) | Self::Configuration(_) => {
                "config_validation"
            }
            Self::Generation(_) => "generation_failure",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) | Self::Source(SourceError::Configuration(_)) => 2,
            Self::Schema(_) | Self::Query(_) => 3,
            Self::Extraction(_) => 4,
            Self::Generation(_) => 5,
            Self::Source(_) => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ApplicationError, ExtractionParseError, QueryError, SchemaError, SourceError,
    };

    #[test]
    fn unknown_table_has_same_class_from_schema_or_builder() {
        let direct = ApplicationError::from(SchemaError::UnknownTable("Foo__c".to_owned()));
        let via_builder = ApplicationError::from(QueryError::Schema(SchemaError::UnknownTable(
            "Foo__c".to_owned(),
        )));

        assert_eq!(direct.error_class(), "unknown_table");
        assert_eq!(via_builder.error_class(), "unknown_table");
        assert_eq!(direct.exit_code(), via_builder.exit_code());
    }

    #[test]
    fn caller_errors_map_to_distinct_classes() {
        let cases = [
            (ApplicationError::from(QueryError::EmptyProjection), "empty_projection"),
            (ApplicationError::from(QueryError::ConflictingCardinality), "conflicting_cardinality"),
            (
                ApplicationError::from(ExtractionParseError::MissingKey("column_names")),
                "extraction_parse",
            ),
        ];

        for (error, class) in cases {
            assert_eq!(error.error_class(), class);
        }
    }

    #[test]
    fn only_remote_failures_are_degradable() {
        assert!(SourceError::Auth("invalid_grant".to_owned()).is_degradable());
        assert!(SourceError::Query("MALFORMED_QUERY".to_owned()).is_degradable());
        assert!(!SourceError::Configuration("missing username".to_owned()).is_degradable());
    }

    #[test]
    fn missing_key_message_names_the_key() {
        let error = ExtractionParseError::MissingKey("condition_columns_values");
        assert_eq!(
            error.to_string(),
            "model output is missing required key `condition_columns_values`"
        );
    }
}
