use super::truncate_sql_bytes;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use std::time::Duration;
use tracing::Level;

/// A `tracing`-based monitor that emits one event per completed statement.
///
/// Events go to target `sqltree.sql`. Failed statements are always emitted at
/// `WARN`; slow statements emit an extra `WARN` event.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Tracing event level for successful statements.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(&ctx.sql);
        let tag = ctx.tag.as_deref().unwrap_or("-");
        let level = if result.is_error() {
            Level::WARN
        } else {
            self.level
        };
        emit_at_level!(
            level,
            target: "sqltree.sql",
            query_type = ?ctx.query_type,
            tag,
            elapsed_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
            result = %result,
            sql = %sql,
            fields = ?ctx.fields,
        );
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        tracing::warn!(
            target: "sqltree.sql",
            query_type = ?ctx.query_type,
            elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            sql = %self.truncate_sql(&ctx.sql),
            "slow statement"
        );
    }
}
