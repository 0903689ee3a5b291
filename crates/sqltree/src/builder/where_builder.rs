//! Shared WHERE clause builder for SELECT, UPDATE and DELETE.

use crate::error::DbResult;
use crate::quote::Quoter;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    /// `column = value`, `column IS NULL` or `column IN (...)`
    Eq { column: String, value: Value },
    /// Caller-written SQL, kept as is.
    Raw(String),
}

/// Reusable WHERE clause builder.
///
/// Conditions are joined with `AND`. Values are quoted when the clause is
/// rendered, so the same builder works for any [`Quoter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereBuilder {
    conditions: Vec<Condition>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if any conditions have been added.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Add `column = value`.
    ///
    /// `NULL` renders as `IS NULL` and a list as `IN (...)`; an empty list
    /// matches nothing.
    pub fn and_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.conditions.push(Condition::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Add a raw SQL condition. Blank text is ignored.
    pub fn and_where(&mut self, condition: impl Into<String>) -> &mut Self {
        let condition = condition.into();
        if !condition.trim().is_empty() {
            self.conditions.push(Condition::Raw(condition.trim().to_string()));
        }
        self
    }

    /// Build the clause (without the `WHERE` keyword).
    pub fn build_clause(&self, quoter: &dyn Quoter) -> DbResult<String> {
        let wrap = self.conditions.len() > 1;
        let mut parts = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let part = match condition {
                Condition::Eq { column, value } => {
                    let column = quoter.quote_identifier(column)?;
                    match value {
                        Value::Null => format!("{column} IS NULL"),
                        Value::List(items) if items.is_empty() => "1=0".to_string(),
                        Value::List(_) => format!("{column} IN ({})", quoter.quote(value)),
                        _ => format!("{column} = {}", quoter.quote(value)),
                    }
                }
                Condition::Raw(sql) if wrap => format!("({sql})"),
                Condition::Raw(sql) => sql.clone(),
            };
            parts.push(part);
        }
        Ok(parts.join(" AND "))
    }

    /// Append ` WHERE <clause>` to `sql` when there are conditions.
    pub(crate) fn append_to(&self, sql: &mut String, quoter: &dyn Quoter) -> DbResult<()> {
        if !self.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.build_clause(quoter)?);
        }
        Ok(())
    }
}
