use super::traits::SqlBuilder;
use crate::error::{DbError, DbResult};
use crate::quote::Quoter;
use crate::value::Value;

/// Insert-or-update statement builder.
///
/// Renders `INSERT ... ON DUPLICATE KEY UPDATE`, updating every non-key field
/// when a row with the same key exists. With an auto-increment key the update
/// list starts with `` `id` = LAST_INSERT_ID(`id`) `` so the driver reports
/// the id of updated rows too.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreBuilder {
    table: String,
    fields: Vec<String>,
    rows: Vec<Vec<Value>>,
    primary_key: Vec<String>,
    auto_increment: Option<String>,
}

impl StoreBuilder {
    pub fn new<I, S>(table: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            primary_key: Vec::new(),
            auto_increment: None,
        }
    }

    pub fn row(&mut self, values: Vec<Value>) -> &mut Self {
        self.rows.push(values);
        self
    }

    pub fn rows(&mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> &mut Self {
        self.rows.extend(rows);
        self
    }

    /// Key columns; these are not overwritten on a duplicate key.
    pub fn primary_key<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_increment(&mut self, field: impl Into<String>) -> &mut Self {
        self.auto_increment = Some(field.into());
        self
    }

    fn is_key(&self, field: &str) -> bool {
        self.primary_key.iter().any(|k| k.eq_ignore_ascii_case(field))
            || self
                .auto_increment
                .as_deref()
                .is_some_and(|k| k.eq_ignore_ascii_case(field))
    }
}

impl SqlBuilder for StoreBuilder {
    fn validate(&self) -> DbResult<()> {
        if self.rows.is_empty() {
            return Err(DbError::NoRows);
        }
        if self.fields.is_empty() {
            return Err(DbError::usage(format!(
                "Unable to store record for {}: no fields specified",
                self.table
            )));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.fields.len() {
                return Err(DbError::usage(format!(
                    "Unable to store record for {}: row {} has {} values, while {} fields are specified",
                    self.table,
                    i + 1,
                    row.len(),
                    self.fields.len()
                )));
            }
        }
        Ok(())
    }

    fn build_sql(&self, quoter: &dyn Quoter) -> DbResult<String> {
        let table = quoter.quote_identifier(&self.table)?;
        let mut columns = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            columns.push(quoter.quote_identifier(field)?);
        }

        let values = self
            .rows
            .iter()
            .map(|row| {
                let row: Vec<String> = row.iter().map(|v| quoter.quote(v)).collect();
                format!("({})", row.join(", "))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut updates = Vec::new();
        if let Some(id) = &self.auto_increment {
            let id = quoter.quote_identifier(id)?;
            updates.push(format!("{id} = LAST_INSERT_ID({id})"));
        }
        for (field, column) in self.fields.iter().zip(&columns) {
            if !self.is_key(field) {
                updates.push(format!("{column} = VALUES({column})"));
            }
        }

        let columns = columns.join(", ");
        if updates.is_empty() {
            return Ok(format!("INSERT IGNORE INTO {table} ({columns}) VALUES {values}"));
        }
        Ok(format!(
            "INSERT INTO {table} ({columns}) VALUES {values} ON DUPLICATE KEY UPDATE {}",
            updates.join(", ")
        ))
    }
}
