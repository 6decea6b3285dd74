pub mod config;
pub mod errors;
pub mod extraction;
pub mod query;
pub mod schema;
pub mod source;

pub use errors::{ApplicationError, ExtractionParseError, QueryError, SchemaError, SourceError};
pub use extraction::{ConditionValue, Extraction};
pub use query::{render_literal, Cardinality, FetchFlags, Predicate, QueryBuilder, QueryRequest};
pub use schema::{SchemaEntry, SchemaRegistry};
pub use source::{DataSource, QueryOutcome, Record};
