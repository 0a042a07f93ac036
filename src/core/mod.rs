//! Core domain: table trees, connectivity, metrics and versioning of NoSQL schema diagrams

pub mod config;
pub mod connectivity;
pub mod error;
pub mod fingerprint;
pub mod metrics;
mod schema;
pub mod serialization;
pub mod store;
pub mod validation;
pub mod versioning;

pub use connectivity::Diagram;
pub use error::{SchemaError, SchemaResult, StoreError};
pub use metrics::{MetricsCache, MetricsReport};
pub use schema::*;
pub use versioning::{SaveOutcome, Solution, Submodel, Version, VersionSync};
