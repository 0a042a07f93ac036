//! Nestschema - Submodel partitioning and design metrics for nested NoSQL schemas
//!
//! Keeps a forest of nested tables and the relationships between them split
//! into connected submodels as the diagram is edited, and derives design
//! metrics (access pattern, redundancy, recovery cost, query coverage) from it.

pub mod core;
