//! Error types for sqltree

use thiserror::Error;

/// Result type alias for sqltree operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// The driver rejected or failed a statement.
    #[error("Query failed: {message}\nQuery: {statement}")]
    Query { message: String, statement: String },

    /// A statement could not be split into a query tree.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An operation that expects at most one row received more.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A store statement was requested without any rows.
    #[error("No rows to store")]
    NoRows,

    /// Caller-supplied arguments don't fit the table or statement.
    #[error("Usage error: {0}")]
    Usage(String),

    /// A result value could not be interpreted.
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a query failure carrying the driver message and the failing SQL.
    pub fn query(message: impl Into<String>, statement: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            statement: statement.into(),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a constraint violation
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a query failure
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// Check if this is a parse error
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Check if this is a constraint violation
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }

    /// Check if this is a usage error
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// The SQL text that failed, for query failures.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Query { statement, .. } => Some(statement),
            _ => None,
        }
    }
}
