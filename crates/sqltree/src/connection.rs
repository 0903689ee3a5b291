//! The connection: driver, quoting dialect, configuration and caches.

use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverOutput, RowCursor};
use crate::error::{DbError, DbResult};
use crate::meta::{KeyedCache, TableMetadata};
use crate::monitor::{QueryContext, QueryMonitor, QueryResult, truncate_sql_bytes};
use crate::quote::{MySqlQuoter, Quoter};
use crate::table::Table;
use crate::value::Value;
use std::sync::Arc;
use std::time::Instant;

/// A database connection with schema awareness.
///
/// Owns the [`Driver`], the [`Quoter`] for its dialect, and the metadata
/// caches. All statements, including metadata queries, go through
/// [`Connection::native_query`] so they are timed, logged and reported to the
/// monitor.
///
/// # Example
///
/// ```ignore
/// use sqltree::{Connection, ConnectionConfig, Params};
///
/// let conn = Connection::new(driver).with_config(ConnectionConfig::new().concurrent_children(true));
/// let stmt = conn.prepare_select("departments", &[], 1, None).await?;
/// let departments = conn.query(stmt, Params::None).await?.into_result_set()?;
/// ```
pub struct Connection<D> {
    driver: D,
    quoter: Box<dyn Quoter>,
    config: ConnectionConfig,
    monitor: Option<Arc<dyn QueryMonitor>>,
    pub(crate) metadata: KeyedCache<String, Arc<TableMetadata>>,
    pub(crate) primary_keys: KeyedCache<(String, bool), Vec<String>>,
}

impl<D: Driver> Connection<D> {
    /// Wrap a driver using the MySQL dialect and default configuration.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            quoter: Box::new(MySqlQuoter),
            config: ConnectionConfig::default(),
            monitor: None,
            metadata: KeyedCache::new(),
            primary_keys: KeyedCache::new(),
        }
    }

    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a different quoting dialect.
    pub fn with_quoter<Q: Quoter + 'static>(mut self, quoter: Q) -> Self {
        self.quoter = Box::new(quoter);
        self
    }

    /// Report every statement to `monitor`.
    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Some(Arc::new(monitor));
        self
    }

    /// Report every statement to a shared monitor.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn quoter(&self) -> &dyn Quoter {
        self.quoter.as_ref()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// A handle for statements on one table.
    pub fn table(&self, name: impl Into<String>) -> Table<'_, D> {
        Table::new(self, name)
    }

    /// Quote a value for embedding in a statement.
    pub fn quote(&self, value: &Value) -> String {
        self.quoter.quote(value)
    }

    /// Quote a (possibly dotted and aliased) identifier.
    pub fn quote_identifier(&self, name: &str) -> DbResult<String> {
        self.quoter.quote_identifier(name)
    }

    /// Run SQL text as is, without decomposition.
    pub async fn native_query(&self, sql: &str) -> DbResult<DriverOutput> {
        self.run(QueryContext::new(sql)).await
    }

    /// Run a statement described by `ctx`.
    pub(crate) async fn run(&self, ctx: QueryContext) -> DbResult<DriverOutput> {
        if let Some(monitor) = &self.monitor {
            monitor.on_query_start(&ctx);
        }

        let start = Instant::now();
        let result = self.driver.execute(&ctx.sql).await;
        let elapsed = start.elapsed();

        let reported = match &result {
            Ok(DriverOutput::Rows(cursor)) => QueryResult::Rows(cursor.rows.len()),
            Ok(DriverOutput::Affected { affected_rows, .. }) => QueryResult::Affected(*affected_rows),
            Err(e) => QueryResult::error(e.message.clone()),
        };

        if self.config.log_statements {
            let sql = match self.config.max_sql_length {
                Some(max) => truncate_sql_bytes(&ctx.sql, max),
                None => &ctx.sql,
            };
            tracing::debug!(
                target: "sqltree.sql",
                query_type = ?ctx.query_type,
                tag = ctx.tag.as_deref().unwrap_or("-"),
                elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                result = %reported,
                sql = %sql,
            );
        }

        if let Some(monitor) = &self.monitor {
            monitor.on_query_complete(&ctx, elapsed, &reported);
            if let Some(threshold) = self.config.slow_query_threshold {
                if elapsed > threshold {
                    monitor.on_slow_query(&ctx, elapsed);
                }
            }
        }

        result.map_err(|e| {
            let message = if e.message.is_empty() {
                self.driver
                    .last_error()
                    .unwrap_or_else(|| "unknown driver error".to_string())
            } else {
                e.message
            };
            DbError::query(message, ctx.sql)
        })
    }

    /// Run a statement that must return rows.
    pub(crate) async fn fetch_rows(&self, ctx: QueryContext) -> DbResult<RowCursor> {
        let sql = ctx.sql.clone();
        match self.run(ctx).await? {
            DriverOutput::Rows(cursor) => Ok(cursor),
            DriverOutput::Affected { .. } => Err(DbError::query(
                "statement did not return a result set",
                sql,
            )),
        }
    }
}
