//! Statement monitoring.
//!
//! Every statement a [`Connection`](crate::Connection) sends to its driver
//! (metadata queries, tree children, transaction control) is reported to an
//! optional [`QueryMonitor`].
//!
//! # Example
//!
//! ```rust,ignore
//! use sqltree::monitor::{CompositeMonitor, StatsMonitor, TracingMonitor};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let monitor = CompositeMonitor::new()
//!     .add(TracingMonitor::new())
//!     .add_arc(stats.clone());
//!
//! let conn = Connection::new(driver).with_monitor(monitor);
//! // ...
//! println!("{} statements", stats.stats().total_queries);
//! ```

mod monitors;
mod tracing_hook;
mod types;


pub use monitors::{CompositeMonitor, NoopMonitor, QueryStats, StatsMonitor};
pub use tracing_hook::TracingMonitor;
pub use types::{QueryContext, QueryMonitor, QueryResult, QueryType};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
