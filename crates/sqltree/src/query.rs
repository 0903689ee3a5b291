//! Running statements: `query` and the single-row helpers built on it.

use crate::builder::{Criteria, Statement};
use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::result::{Cell, Outcome, Row};
use crate::splitter::{Params, bind, starts_with_keyword, strip_sql_prefix};
use crate::tree::extract_tree;
use crate::value::Value;

/// Arguments for a SELECT passed to [`Connection::load`] in place of a table.
fn criteria_params(criteria: Criteria) -> Params {
    match criteria {
        Criteria::None => Params::None,
        Criteria::Key(values) => Params::Positional(values),
        Criteria::Fields(pairs) => Params::Named(pairs),
    }
}

impl<D: Driver> Connection<D> {
    /// Run a statement: bind `params`, decompose nested selects, execute and
    /// assemble the result.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let departments = conn
    ///     .query(
    ///         "SELECT id, name, \
    ///          (SELECT id, name FROM employees WHERE department_id = departments.id) AS staff \
    ///          FROM departments WHERE id > ?",
    ///         vec![10],
    ///     )
    ///     .await?
    ///     .into_result_set()?;
    /// ```
    pub async fn query(
        &self,
        statement: impl Into<Statement>,
        params: impl Into<Params>,
    ) -> DbResult<Outcome> {
        let statement = statement.into();
        let params = params.into();
        let sql = if params.is_empty() {
            statement.sql().to_string()
        } else {
            bind(statement.sql(), &params, self.quoter())?
        };

        let tree = extract_tree(&sql, self.quoter())?;
        Ok(match self.execute_tree(&tree).await? {
            Outcome::Rows(set) => Outcome::Rows(set.with_base_table(statement.base_table())),
            other => other,
        })
    }

    /// Run `statement` and return its only row, if any.
    async fn single_row(&self, statement: Statement, target: &str) -> DbResult<Option<Row>> {
        let set = self.query(statement, Params::None).await?.into_result_set()?;
        if set.len() > 1 {
            return Err(DbError::constraint(format!(
                "Select on table `{target}` failed: Query resulted in {} records",
                set.len()
            )));
        }
        Ok(set.into_rows().into_iter().next())
    }

    /// Load one record by primary key or `field = value` criteria.
    ///
    /// `table` may also be a SELECT statement; key criteria then fill its `?`
    /// placeholders and field criteria its `:name` placeholders. More than one
    /// matching row is a [`DbError::Constraint`].
    pub async fn load(&self, table: &str, criteria: impl Into<Criteria>) -> DbResult<Option<Row>> {
        let criteria = criteria.into();
        if starts_with_keyword(strip_sql_prefix(table), "SELECT") {
            let params = criteria_params(criteria);
            let sql = bind(table, &params, self.quoter())?;
            return self.single_row(Statement::new(sql), "(statement)").await;
        }
        let statement = self.prepare_select(table, &[], criteria, None).await?;
        self.single_row(statement, table).await
    }

    /// A single value of `field` from the record matching `criteria`.
    ///
    /// `field` may be a role reference (`#description`) or an expression.
    /// No matching record yields `Value::Null`.
    pub async fn lookup_value(
        &self,
        table: &str,
        field: &str,
        criteria: impl Into<Criteria>,
    ) -> DbResult<Value> {
        let statement = self.prepare_select(table, &[field], criteria, None).await?;
        let row = self.single_row(statement, table).await?;
        Ok(match row.and_then(|r| r.into_cells().into_iter().next()) {
            Some(Cell::Value(value)) => value,
            _ => Value::Null,
        })
    }

    /// Number of rows of `table` matching `criteria` (all rows for `Criteria::None`).
    pub async fn count_rows(&self, table: &str, criteria: impl Into<Criteria>) -> DbResult<u64> {
        let statement = self
            .prepare_select(table, &["COUNT(*)"], criteria, None)
            .await?;
        let set = self.query(statement, Params::None).await?.into_result_set()?;
        let value = set
            .first()
            .and_then(|row| row.cells().first())
            .and_then(Cell::as_value)
            .cloned()
            .unwrap_or_default();
        value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| DbError::decode("COUNT(*)", format!("'{value}' is not a row count")))
    }
}
