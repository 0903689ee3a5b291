//! The database driver seam.
//!
//! sqltree never talks to a server itself. A [`Driver`] accepts fully
//! rendered SQL text and hands back either a row cursor or an affected-row
//! count. Connection establishment, TLS, pooling and timeouts are the
//! driver's business.

use crate::value::Value;
use std::future::Future;

/// Column descriptor reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriverColumn {
    pub name: String,
    /// Originating table, if the driver knows it.
    pub table: Option<String>,
    /// Native type name (e.g. `VARCHAR`, `BIGINT`).
    pub native_type: String,
}

impl DriverColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = native_type.into();
        self
    }
}

/// A fully fetched row cursor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowCursor {
    pub columns: Vec<DriverColumn>,
    pub rows: Vec<Vec<Value>>,
}

impl RowCursor {
    pub fn new(columns: Vec<DriverColumn>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Cursor with untyped columns, convenient for tests and in-memory drivers.
    pub fn from_names<S: AsRef<str>>(names: &[S], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: names
                .iter()
                .map(|n| DriverColumn::new(n.as_ref()))
                .collect(),
            rows,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOutput {
    /// A row-returning statement.
    Rows(RowCursor),
    /// A statement without a result set.
    Affected {
        affected_rows: u64,
        /// Auto-increment id generated by the statement, if any.
        last_insert_id: Option<u64>,
    },
}

/// A failure reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DriverError {}

/// A database connection able to run SQL text.
///
/// # Example
/// ```ignore
/// struct MyDriver { /* a real MySQL connection */ }
///
/// impl Driver for MyDriver {
///     async fn execute(&self, sql: &str) -> Result<DriverOutput, DriverError> {
///         // run `sql`, translate the result
///     }
/// }
/// ```
pub trait Driver: Send + Sync {
    /// Run one statement and fully fetch its result.
    fn execute(
        &self,
        sql: &str,
    ) -> impl Future<Output = Result<DriverOutput, DriverError>> + Send;

    /// Text of the last error raised on this connection.
    fn last_error(&self) -> Option<String> {
        None
    }

    /// Whether several statements may be in flight at once on this driver.
    ///
    /// Children of a tree query only run concurrently when this returns `true`.
    fn supports_concurrent_statements(&self) -> bool {
        false
    }
}

impl<D: Driver> Driver for &D {
    fn execute(
        &self,
        sql: &str,
    ) -> impl Future<Output = Result<DriverOutput, DriverError>> + Send {
        (**self).execute(sql)
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }

    fn supports_concurrent_statements(&self) -> bool {
        (**self).supports_concurrent_statements()
    }
}

impl<D: Driver> Driver for std::sync::Arc<D> {
    fn execute(
        &self,
        sql: &str,
    ) -> impl Future<Output = Result<DriverOutput, DriverError>> + Send {
        (**self).execute(sql)
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }

    fn supports_concurrent_statements(&self) -> bool {
        (**self).supports_concurrent_statements()
    }
}
