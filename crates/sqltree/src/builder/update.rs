use super::traits::SqlBuilder;
use super::where_builder::WhereBuilder;
use crate::error::{DbError, DbResult};
use crate::quote::Quoter;
use crate::value::Value;

/// UPDATE statement builder. Requires both SET values and a WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBuilder {
    table: String,
    set: Vec<(String, Value)>,
    where_builder: WhereBuilder,
}

impl UpdateBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            where_builder: WhereBuilder::new(),
        }
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.set.push((column.into(), value.into()));
        self
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

impl SqlBuilder for UpdateBuilder {
    fn validate(&self) -> DbResult<()> {
        if self.set.is_empty() {
            return Err(DbError::usage(format!(
                "Unable to update table `{}`: no values to set",
                self.table
            )));
        }
        if self.where_builder.is_empty() {
            return Err(DbError::usage(format!(
                "Unable to update table `{}`: no criteria given",
                self.table
            )));
        }
        Ok(())
    }

    fn build_sql(&self, quoter: &dyn Quoter) -> DbResult<String> {
        let mut assignments = Vec::with_capacity(self.set.len());
        for (column, value) in &self.set {
            assignments.push(format!(
                "{} = {}",
                quoter.quote_identifier(column)?,
                quoter.quote(value)
            ));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            quoter.quote_identifier(&self.table)?,
            assignments.join(", ")
        );
        self.where_builder.append_to(&mut sql, quoter)?;
        Ok(sql)
    }
}
