use crate::splitter::{starts_with_keyword, strip_sql_prefix};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The kind of statement being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    /// INSERT, REPLACE and store (insert-or-update) statements
    Insert,
    Update,
    /// DELETE and TRUNCATE
    Delete,
    /// Metadata (`SHOW ...`) and everything else
    Other,
}

impl QueryType {
    /// Detect the statement kind from its leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = strip_sql_prefix(sql);
        if starts_with_keyword(trimmed, "SELECT") {
            QueryType::Select
        } else if starts_with_keyword(trimmed, "INSERT") || starts_with_keyword(trimmed, "REPLACE")
        {
            QueryType::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            QueryType::Update
        } else if starts_with_keyword(trimmed, "DELETE") || starts_with_keyword(trimmed, "TRUNCATE")
        {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

/// What is known about a statement when it is sent to the driver.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// SQL text as sent to the driver (placeholders already bound).
    pub sql: String,
    pub query_type: QueryType,
    /// Where the statement comes from (`metadata`, `tree.child`, ...).
    pub tag: Option<String>,
    /// Extra low-cardinality fields.
    pub fields: BTreeMap<String, String>,
}

impl QueryContext {
    pub fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            query_type: QueryType::from_sql(sql),
            tag: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of one statement, for monitoring purposes.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Statement returned rows.
    Rows(usize),
    /// Statement changed rows.
    Affected(u64),
    /// Statement failed (message truncated to 512 bytes).
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating long driver messages.
    pub fn error(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.len() > MAX_ERROR_LEN {
            Self::Error(format!(
                "{}...",
                super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)
            ))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Receives a callback for each statement run.
///
/// Implement this to collect metrics or forward statements to an
/// observability system.
pub trait QueryMonitor: Send + Sync {
    /// Called before a statement is sent to the driver.
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// Called after a statement completes (success or failure).
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// Called when a statement exceeds the configured slow-query threshold.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
