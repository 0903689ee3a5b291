//! Scripted in-memory driver for unit tests.

use crate::driver::{Driver, DriverError, DriverOutput, RowCursor};
use crate::value::Value;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Response {
    Output(DriverOutput),
    Fail(String),
}

/// Answers statements from a script and records what was executed.
///
/// A rule matches when its needle equals the statement or is contained in it;
/// the longest matching needle wins.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDriver {
    rules: Vec<(String, Response)>,
    log: Mutex<Vec<String>>,
    concurrent: bool,
}

impl ScriptedDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on_rows(mut self, needle: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.rules.push((
            needle.to_string(),
            Response::Output(DriverOutput::Rows(RowCursor::from_names(columns, rows))),
        ));
        self
    }

    pub(crate) fn on_affected(mut self, needle: &str, affected: u64, last_id: Option<u64>) -> Self {
        self.rules.push((
            needle.to_string(),
            Response::Output(DriverOutput::Affected {
                affected_rows: affected,
                last_insert_id: last_id,
            }),
        ));
        self
    }

    pub(crate) fn on_error(mut self, needle: &str, message: &str) -> Self {
        self.rules
            .push((needle.to_string(), Response::Fail(message.to_string())));
        self
    }

    pub(crate) fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, needle: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.contains(needle))
            .count()
    }

    fn respond(&self, sql: &str) -> Result<DriverOutput, DriverError> {
        self.log.lock().unwrap().push(sql.to_string());
        let rule = self
            .rules
            .iter()
            .filter(|(needle, _)| sql == needle || sql.contains(needle.as_str()))
            .max_by_key(|(needle, _)| needle.len());
        match rule {
            Some((_, Response::Output(out))) => Ok(out.clone()),
            Some((_, Response::Fail(msg))) => Err(DriverError::new(msg.clone())),
            None => Err(DriverError::new(format!("no scripted response for: {sql}"))),
        }
    }
}

impl Driver for ScriptedDriver {
    async fn execute(&self, sql: &str) -> Result<DriverOutput, DriverError> {
        tokio::task::yield_now().await;
        self.respond(sql)
    }

    fn supports_concurrent_statements(&self) -> bool {
        self.concurrent
    }
}

/// `SHOW FIELDS` columns.
pub(crate) const FIELD_COLUMNS: &[&str] = &["Field", "Type", "Null", "Key", "Default", "Extra"];

/// One `SHOW FIELDS` row.
pub(crate) fn field_row(name: &str, ty: &str, null: bool, key: &str, extra: &str) -> Vec<Value> {
    vec![
        name.into(),
        ty.into(),
        if null { "YES" } else { "NO" }.into(),
        key.into(),
        Value::Null,
        extra.into(),
    ]
}

/// Script the metadata statements of one table.
///
/// `fields` are `(name, type, key, extra)`, all NOT NULL; `foreign_keys` are
/// `(column, referenced table, referenced column)`.
pub(crate) fn script_table(
    driver: ScriptedDriver,
    table: &str,
    fields: &[(&str, &str, &str, &str)],
    foreign_keys: &[(&str, Option<&str>, &str)],
) -> ScriptedDriver {
    let rows: Vec<Vec<Value>> = fields
        .iter()
        .map(|(name, ty, key, extra)| field_row(name, ty, false, key, extra))
        .collect();
    let pk_rows: Vec<Vec<Value>> = rows
        .iter()
        .filter(|r| r[3] == Value::from("PRI"))
        .cloned()
        .collect();
    let auto_rows: Vec<Vec<Value>> = pk_rows
        .iter()
        .filter(|r| r[5] == Value::from("auto_increment"))
        .cloned()
        .collect();
    let fk_rows = foreign_keys
        .iter()
        .map(|(c, t, rc)| vec![Value::from(*c), Value::from(*t), Value::from(*rc)])
        .collect();

    driver
        .on_rows(
            &format!("SHOW TABLE STATUS LIKE '{table}'"),
            &["Name", "Engine", "Row_format", "Max_data_length", "Create_time", "Collation"],
            vec![vec![
                table.into(),
                "InnoDB".into(),
                "Dynamic".into(),
                Value::UInt(0),
                "2024-01-01 00:00:00".into(),
                "utf8mb4_general_ci".into(),
            ]],
        )
        .on_rows(&format!("SHOW FIELDS FROM `{table}`"), FIELD_COLUMNS, rows)
        .on_rows(
            &format!("SHOW FIELDS FROM `{table}` WHERE `Key` = 'PRI'"),
            FIELD_COLUMNS,
            pk_rows,
        )
        .on_rows(
            &format!("SHOW FIELDS FROM `{table}` WHERE `Key` = 'PRI' AND `Extra` = 'auto_increment'"),
            FIELD_COLUMNS,
            auto_rows,
        )
        .on_rows(
            &format!("AND `TABLE_NAME` = '{table}' AND"),
            &["COLUMN_NAME", "REFERENCED_TABLE", "REFERENCED_COLUMN_NAME"],
            fk_rows,
        )
}
