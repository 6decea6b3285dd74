//! SOQL construction.
//!
//! Grammar: `SELECT <f1, f2> FROM <table>[ WHERE <p1>[ AND <p2>]*]` with every predicate an
//! equality. Clause order always equals input order.
//!
//! Text literals are interpolated between single quotes with no escaping, so a value that
//! contains `'` changes the query text. That behaviour is kept for compatibility and lives
//! entirely in [`render_literal`]; swapping in escaping or bind parameters only touches that
//! function.

use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use tracing::warn;

use crate::errors::QueryError;
use crate::extraction::{ConditionValue, Extraction};
use crate::schema::SchemaRegistry;

/// Characters left alone when embedding SOQL in a URL: unreserved characters and `/`.
const QUERY_TEXT: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'_').remove(b'.').remove(b'-').remove(b'~').remove(b'/');

/// What the caller wants back from the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// First record, or an explicit empty result.
    One,
    /// Every returned record.
    All,
    /// The response envelope, unmodified.
    #[default]
    Envelope,
}

/// Raw fetch flags as a caller supplies them. At most one may be set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchFlags {
    pub one: bool,
    pub all: bool,
}

impl FetchFlags {
    pub fn one() -> Self {
        Self { one: true, all: false }
    }

    pub fn all() -> Self {
        Self { one: false, all: true }
    }

    pub fn resolve(self) -> Result<Cardinality, QueryError> {
        match (self.one, self.all) {
            (true, true) => Err(QueryError::ConflictingCardinality),
            (true, false) => Ok(Cardinality::One),
            (false, true) => Ok(Cardinality::All),
            (false, false) => Ok(Cardinality::Envelope),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Predicate {
    pub field: String,
    pub value: ConditionValue,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, render_literal(&self.value))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryRequest {
    table: String,
    fields: Vec<String>,
    predicates: Vec<Predicate>,
    cardinality: Cardinality,
}

impl QueryRequest {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn soql(&self) -> String {
        let mut soql = format!("SELECT {} FROM {}", self.fields.join(", "), self.table);
        if !self.predicates.is_empty() {
            let conditions =
                self.predicates.iter().map(Predicate::to_string).collect::<Vec<_>>().join(" AND ");
            soql.push_str(" WHERE ");
            soql.push_str(&conditions);
        }
        soql
    }

    /// The SOQL text, percent-encoded for the `q` query parameter.
    pub fn encoded_soql(&self) -> String {
        encode_query_text(&self.soql())
    }
}

impl fmt::Display for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.soql())
    }
}

/// Renders a predicate value: numbers and booleans bare, text single-quoted as-is.
pub fn render_literal(value: &ConditionValue) -> String {
    match value {
        ConditionValue::Number(number) => number.to_string(),
        ConditionValue::Boolean(flag) => flag.to_string(),
        ConditionValue::Text(text) => format!("'{text}'"),
    }
}

pub fn encode_query_text(text: &str) -> String {
    utf8_percent_encode(text, QUERY_TEXT).to_string()
}

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    schemas: Arc<SchemaRegistry>,
}

impl QueryBuilder {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self { schemas }
    }

    pub fn build(
        &self,
        table: &str,
        extraction: &Extraction,
        fetch: FetchFlags,
    ) -> Result<QueryRequest, QueryError> {
        self.schemas.fields_for(table)?;

        if extraction.target_fields().is_empty() {
            return Err(QueryError::EmptyProjection);
        }
        let cardinality = fetch.resolve()?;

        let predicates = extraction
            .conditions()
            .map(|(field, value)| {
                if matches!(value, ConditionValue::Text(text) if text.contains('\'')) {
                    warn!(
                        event_name = "query.builder.unescaped_quote",
                        table,
                        field,
                        "condition value contains a single quote and is interpolated unescaped"
                    );
                }
                Predicate { field: field.to_string(), value: value.clone() }
            })
            .collect();

        Ok(QueryRequest {
            table: table.to_string(),
            fields: extraction.target_fields().to_vec(),
            predicates,
            cardinality,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        encode_query_text, render_literal, Cardinality, FetchFlags, QueryBuilder,
    };
    use crate::errors::{QueryError, SchemaError};
    use crate::extraction::{ConditionValue, Extraction};
    use crate::schema::{SchemaEntry, SchemaRegistry, DUPIXENT_TABLE};

    fn builder() -> QueryBuilder {
        let test_table = SchemaEntry::new("T", ["balance", "id", "qty", "a", "b"]).expect("entry");
        QueryBuilder::new(Arc::new(SchemaRegistry::builtin().extended([test_table])))
    }

    #[test]
    fn text_condition_is_single_quoted() {
        let extraction = Extraction::from_pairs(["balance"], [("id", "P005")]);
        let request = builder().build("T", &extraction, FetchFlags::default()).expect("query");

        assert_eq!(request.soql(), "SELECT balance FROM T WHERE id = 'P005'");
    }

    #[test]
    fn numeric_condition_is_unquoted() {
        let extraction = Extraction::from_pairs(["balance"], [("qty", 5_i64)]);
        let request = builder().build("T", &extraction, FetchFlags::default()).expect("query");

        assert_eq!(request.soql(), "SELECT balance FROM T WHERE qty = 5");
    }

    #[test]
    fn conditions_keep_input_order() {
        let extraction = Extraction::from_pairs(
            ["balance"],
            [("b", ConditionValue::from("x")), ("a", ConditionValue::from(1_i64))],
        );
        let request = builder().build("T", &extraction, FetchFlags::all()).expect("query");
        assert_eq!(request.soql(), "SELECT balance FROM T WHERE b = 'x' AND a = 1");

        let swapped = Extraction::from_pairs(
            ["balance"],
            [("a", ConditionValue::from(1_i64)), ("b", ConditionValue::from("x"))],
        );
        let request = builder().build("T", &swapped, FetchFlags::all()).expect("query");
        assert_eq!(request.soql(), "SELECT balance FROM T WHERE a = 1 AND b = 'x'");
    }

    #[test]
    fn no_conditions_omits_where_clause() {
        let extraction =
            Extraction::from_pairs(["id", "balance"], Vec::<(String, ConditionValue)>::new());
        let request = builder().build("T", &extraction, FetchFlags::default()).expect("query");

        assert_eq!(request.soql(), "SELECT id, balance FROM T");
        assert!(request.predicates().is_empty());
    }

    #[test]
    fn empty_projection_fails_loudly() {
        let extraction = Extraction::from_pairs(Vec::<String>::new(), [("id", "P005")]);
        assert_eq!(
            builder().build("T", &extraction, FetchFlags::default()),
            Err(QueryError::EmptyProjection)
        );
    }

    #[test]
    fn conflicting_cardinality_only_when_both_flags_set() {
        let extraction = Extraction::from_pairs(["balance"], [("id", "P005")]);
        let both = FetchFlags { one: true, all: true };

        assert_eq!(
            builder().build("T", &extraction, both),
            Err(QueryError::ConflictingCardinality)
        );

        let resolved = [
            (FetchFlags::one(), Cardinality::One),
            (FetchFlags::all(), Cardinality::All),
            (FetchFlags::default(), Cardinality::Envelope),
        ];
        for (flags, expected) in resolved {
            let request = builder().build("T", &extraction, flags).expect("query");
            assert_eq!(request.cardinality(), expected);
        }
    }

    #[test]
    fn unregistered_table_is_rejected() {
        let extraction = Extraction::from_pairs(["Id"], [("Id", "001")]);
        assert_eq!(
            builder().build("Account", &extraction, FetchFlags::default()),
            Err(QueryError::Schema(SchemaError::UnknownTable("Account".to_string())))
        );
    }

    #[test]
    fn copay_balance_query_matches_expected_text() {
        let extraction = Extraction::from_pairs(
            ["PNEX__Copay_Balance_Bylvay__c"],
            [("PNEX__Patient_Id_Bylvay__c", "P005")],
        );
        let request =
            builder().build(DUPIXENT_TABLE, &extraction, FetchFlags::one()).expect("query");

        assert_eq!(
            request.to_string(),
            "SELECT PNEX__Copay_Balance_Bylvay__c FROM PNEX__DUPIXENT__c \
             WHERE PNEX__Patient_Id_Bylvay__c = 'P005'"
        );
    }

    #[test]
    fn literal_quotes_are_not_escaped() {
        assert_eq!(render_literal(&ConditionValue::from("O'Brien")), "'O'Brien'");
        assert_eq!(render_literal(&ConditionValue::from(true)), "true");
        assert_eq!(render_literal(&ConditionValue::float(12.5).expect("finite")), "12.5");
    }

    #[test]
    fn encoding_keeps_unreserved_characters() {
        assert_eq!(
            encode_query_text("SELECT Id, Name FROM T WHERE x = 'P-5_a.b~/c'"),
            "SELECT%20Id%2C%20Name%20FROM%20T%20WHERE%20x%20%3D%20%27P-5_a.b~/c%27"
        );
    }
}
