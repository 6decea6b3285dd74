//! Remote data source adapters.
//!
//! `salesforce` authenticates with the OAuth password grant and runs rendered SOQL
//! against the REST query endpoint.

pub mod salesforce;

pub use salesforce::SalesforceClient;
