use std::fmt;

/// SQL text ready to run, with the table it was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    base_table: Option<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            base_table: None,
        }
    }

    /// Attach the table used to resolve primary keys of the results.
    pub fn with_base_table(mut self, table: impl Into<String>) -> Self {
        self.base_table = Some(table.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn base_table(&self) -> Option<&str> {
        self.base_table.as_deref()
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}
