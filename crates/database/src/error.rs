use core_types::{CoreError, Role};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to connect to the {role} database: {source}")]
    ConnectionFailure {
        role: Role,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema operation failed on the {role} database: {source} (statement: {statement})")]
    SchemaOperationFailure {
        role: Role,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Query failed on the {role} database: {source} (statement: {statement})")]
    QueryExecutionFailure {
        role: Role,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Invalid model descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Column `{column}` is not declared on table `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("Model validation failed: {0}")]
    Validation(String),

    #[error("Failed to convert between a model and a record: {0}")]
    Conversion(#[from] CoreError),

    #[error("An error occurred during JSON serialization/deserialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    /// The role an I/O failure happened on, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            DbError::ConnectionFailure { role, .. }
            | DbError::SchemaOperationFailure { role, .. }
            | DbError::QueryExecutionFailure { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// The SQL text that failed, if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            DbError::SchemaOperationFailure { statement, .. }
            | DbError::QueryExecutionFailure { statement, .. } => Some(statement),
            _ => None,
        }
    }
}
