use super::traits::SqlBuilder;
use super::where_builder::WhereBuilder;
use crate::error::DbResult;
use crate::quote::Quoter;
use crate::value::Value;

/// SELECT statement builder.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectBuilder {
    table: String,
    fields: Vec<String>,
    where_builder: WhereBuilder,
}

impl SelectBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            where_builder: WhereBuilder::new(),
        }
    }

    /// Add an output field. Identifiers are quoted; anything else (functions,
    /// nested selects) is used as written.
    pub fn field(&mut self, field: impl Into<String>) -> &mut Self {
        self.fields.push(field.into());
        self
    }

    pub fn fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
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

impl SqlBuilder for SelectBuilder {
    fn build_sql(&self, quoter: &dyn Quoter) -> DbResult<String> {
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            let mut rendered = Vec::with_capacity(self.fields.len());
            for field in &self.fields {
                if quoter.valid_identifier(field, None, true) {
                    rendered.push(quoter.quote_identifier(field)?);
                } else {
                    rendered.push(field.trim().to_string());
                }
            }
            rendered.join(", ")
        };

        let mut sql = format!(
            "SELECT {fields} FROM {}",
            quoter.quote_identifier(&self.table)?
        );
        self.where_builder.append_to(&mut sql, quoter)?;
        Ok(sql)
    }
}
