//! Error types of the schema engine

use super::schema::ColumnType;
use super::validation::ValidationError;

/// Errors raised by the connectivity, versioning and serialization layers
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Tables '{source_label}' and '{target_label}' are already related")]
    DuplicateRelationship {
        source_label: String,
        target_label: String,
    },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Relationship not found: {0}")]
    EdgeNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Table {0} is not a top-level table")]
    NotTopLevel(String),

    #[error("Table {0} is not a nested table")]
    NotNested(String),

    #[error("Column '{name}' is a {column_type} column and cannot be edited")]
    ProtectedColumn {
        name: String,
        column_type: ColumnType,
    },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName {
        name: String,
        reason: ValidationError,
    },

    #[error("Node {node_id} does not match the stored shape: {reason}")]
    SerializationMismatch { node_id: String, reason: String },

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Solution not found: {0}")]
    SolutionNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl SchemaError {
    pub fn invalid_name(name: &str, reason: ValidationError) -> Self {
        SchemaError::InvalidName {
            name: name.to_string(),
            reason,
        }
    }
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised by a version store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Solution {0} does not exist in the store")]
    SolutionNotFound(String),

    #[error("Version {0} does not exist in the store")]
    VersionNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = SchemaError::DuplicateRelationship {
            source_label: "users".into(),
            target_label: "orders".into(),
        };
        assert_eq!(
            err.to_string(),
            "Tables 'users' and 'orders' are already related"
        );

        let err = SchemaError::ProtectedColumn {
            name: "users_id".into(),
            column_type: ColumnType::PrimaryKey,
        };
        assert_eq!(
            err.to_string(),
            "Column 'users_id' is a PRIMARY_KEY column and cannot be edited"
        );
    }

    #[test]
    fn test_store_error_is_wrapped() {
        let err: SchemaError = StoreError::Unavailable("offline".into()).into();
        assert!(matches!(err, SchemaError::Persistence(_)));
        assert_eq!(err.to_string(), "Persistence error: Store unavailable: offline");
    }
}
