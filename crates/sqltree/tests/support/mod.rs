//! In-memory driver answering statements from a script.

#![allow(dead_code)]

use sqltree::{Driver, DriverError, DriverOutput, RowCursor, Value};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryDriver {
    rules: Vec<(String, Result<DriverOutput, String>)>,
    log: Mutex<Vec<String>>,
    concurrent: bool,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `needle` with rows. The longest matching needle wins.
    pub fn rows(mut self, needle: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.rules.push((
            needle.into(),
            Ok(DriverOutput::Rows(RowCursor::from_names(columns, rows))),
        ));
        self
    }

    pub fn affected(mut self, needle: &str, affected_rows: u64, last_insert_id: Option<u64>) -> Self {
        self.rules.push((
            needle.into(),
            Ok(DriverOutput::Affected {
                affected_rows,
                last_insert_id,
            }),
        ));
        self
    }

    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.into(), Err(message.into())));
        self
    }

    pub fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }

    /// Script `SHOW FIELDS` and primary key statements of a table.
    ///
    /// `fields` are `(name, type, key, extra)`.
    pub fn table(self, table: &str, fields: &[(&str, &str, &str, &str)]) -> Self {
        let columns = ["Field", "Type", "Null", "Key", "Default", "Extra"];
        let row = |(name, ty, key, extra): &(&str, &str, &str, &str)| {
            vec![
                Value::from(*name),
                Value::from(*ty),
                Value::from("NO"),
                Value::from(*key),
                Value::Null,
                Value::from(*extra),
            ]
        };
        let all: Vec<_> = fields.iter().map(row).collect();
        let pk: Vec<_> = fields.iter().filter(|f| f.2 == "PRI").map(row).collect();
        let auto: Vec<_> = fields
            .iter()
            .filter(|f| f.2 == "PRI" && f.3 == "auto_increment")
            .map(row)
            .collect();

        self.rows(
            &format!("SHOW TABLE STATUS LIKE '{table}'"),
            &["Name", "Engine"],
            vec![vec![table.into(), "InnoDB".into()]],
        )
        .rows(&format!("SHOW FIELDS FROM `{table}`"), &columns, all)
        .rows(&format!("SHOW FIELDS FROM `{table}` WHERE `Key` = 'PRI'"), &columns, pk)
        .rows(
            &format!("SHOW FIELDS FROM `{table}` WHERE `Key` = 'PRI' AND `Extra` = 'auto_increment'"),
            &columns,
            auto,
        )
        .rows(
            &format!("AND `TABLE_NAME` = '{table}' AND"),
            &["COLUMN_NAME", "REFERENCED_TABLE", "REFERENCED_COLUMN_NAME"],
            vec![],
        )
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.executed().iter().filter(|s| s.contains(needle)).count()
    }
}

impl Driver for MemoryDriver {
    async fn execute(&self, sql: &str) -> Result<DriverOutput, DriverError> {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(sql.to_string());
        let rule = self
            .rules
            .iter()
            .filter(|(needle, _)| sql.contains(needle.as_str()))
            .max_by_key(|(needle, _)| needle.len());
        match rule {
            Some((_, Ok(output))) => Ok(output.clone()),
            Some((_, Err(message))) => Err(DriverError::new(message.clone())),
            None => Err(DriverError::new(format!("no scripted response for: {sql}"))),
        }
    }

    fn supports_concurrent_statements(&self) -> bool {
        self.concurrent
    }
}
