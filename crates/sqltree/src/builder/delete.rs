use super::traits::SqlBuilder;
use super::where_builder::WhereBuilder;
use crate::error::{DbError, DbResult};
use crate::quote::Quoter;
use crate::value::Value;

/// DELETE statement builder.
///
/// A DELETE without conditions is rejected; emptying a table must be asked
/// for with [`DeleteBuilder::truncate`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteBuilder {
    table: String,
    truncate: bool,
    where_builder: WhereBuilder,
}

impl DeleteBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            truncate: false,
            where_builder: WhereBuilder::new(),
        }
    }

    /// `TRUNCATE` the whole table.
    pub fn truncate(table: impl Into<String>) -> Self {
        Self {
            truncate: true,
            ..Self::new(table)
        }
    }

    pub fn and_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_builder.and_eq(column, value);
        self
    }

    pub fn and_where(&mut self, condition: impl Into<String>) -> &mut Self {
        self.where_builder.and_where(condition);
        self
    }
}

impl SqlBuilder for DeleteBuilder {
    fn validate(&self) -> DbResult<()> {
        if !self.truncate && self.where_builder.is_empty() {
            return Err(DbError::usage(format!(
                "Unable to delete from table `{}`: no criteria given",
                self.table
            )));
        }
        Ok(())
    }

    fn build_sql(&self, quoter: &dyn Quoter) -> DbResult<String> {
        let table = quoter.quote_identifier(&self.table)?;
        if self.truncate {
            return Ok(format!("TRUNCATE {table}"));
        }
        let mut sql = format!("DELETE FROM {table}");
        self.where_builder.append_to(&mut sql, quoter)?;
        Ok(sql)
    }
}
