//! A table bound to its connection.

use crate::builder::{Criteria, DeleteScope, Statement, StoreRows};
use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::DbResult;
use crate::meta::TableMetadata;
use crate::result::{Outcome, Row};
use crate::splitter::Params;
use crate::value::Value;
use std::sync::Arc;

/// Statements and lookups on one table.
///
/// Statements prepared through a `Table` remember it as their base table,
/// and results of those statements report it via
/// [`ResultSet::base_table`](crate::ResultSet::base_table).
///
/// # Example
///
/// ```ignore
/// let users = conn.table("users");
/// let stmt = users.prepare_update(7, [("#active", false)]).await?;
/// users.query(stmt, ()).await?;
/// ```
pub struct Table<'c, D> {
    conn: &'c Connection<D>,
    name: String,
}

impl<'c, D: Driver> Table<'c, D> {
    pub(crate) fn new(conn: &'c Connection<D>, name: impl Into<String>) -> Self {
        Self {
            conn,
            name: name.into(),
        }
    }

    /// Table name as given (may carry an alias).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &'c Connection<D> {
        self.conn
    }

    fn base(&self) -> String {
        self.conn.base_name(&self.name)
    }

    pub async fn metadata(&self) -> DbResult<Arc<TableMetadata>> {
        self.conn.fetch_metadata(&self.base()).await
    }

    pub async fn primary_key(&self) -> DbResult<Vec<String>> {
        self.conn.get_primary_key(&self.base(), false, false).await
    }

    pub async fn field_names(&self) -> DbResult<Vec<String>> {
        self.conn.get_field_names(&self.base()).await
    }

    pub async fn prepare_select(
        &self,
        fields: &[&str],
        criteria: impl Into<Criteria>,
        where_clause: Option<&str>,
    ) -> DbResult<Statement> {
        let statement = self
            .conn
            .prepare_select(&self.name, fields, criteria, where_clause)
            .await?;
        Ok(statement.with_base_table(self.base()))
    }

    pub async fn prepare_store(&self, rows: StoreRows) -> DbResult<Statement> {
        let statement = self.conn.prepare_store(&self.name, rows).await?;
        Ok(statement.with_base_table(self.base()))
    }

    pub async fn prepare_update<I, K, T>(
        &self,
        id: impl Into<Criteria>,
        values: I,
    ) -> DbResult<Statement>
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        let statement = self.conn.prepare_update(&self.name, id, values).await?;
        Ok(statement.with_base_table(self.base()))
    }

    pub async fn prepare_delete(&self, scope: impl Into<DeleteScope>) -> DbResult<Statement> {
        let statement = self.conn.prepare_delete(&self.name, scope).await?;
        Ok(statement.with_base_table(self.base()))
    }

    /// Run a statement; raw text is attributed to this table.
    pub async fn query(
        &self,
        statement: impl Into<Statement>,
        params: impl Into<Params>,
    ) -> DbResult<Outcome> {
        let mut statement = statement.into();
        if statement.base_table().is_none() {
            statement = statement.with_base_table(self.base());
        }
        self.conn.query(statement, params).await
    }

    pub async fn load(&self, criteria: impl Into<Criteria>) -> DbResult<Option<Row>> {
        self.conn.load(&self.name, criteria).await
    }

    pub async fn lookup_value(&self, field: &str, criteria: impl Into<Criteria>) -> DbResult<Value> {
        self.conn.lookup_value(&self.name, field, criteria).await
    }

    pub async fn count_rows(&self, criteria: impl Into<Criteria>) -> DbResult<u64> {
        self.conn.count_rows(&self.name, criteria).await
    }
}
