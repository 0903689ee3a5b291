//! # sqltree
//!
//! A schema-aware MySQL access layer with tree queries.
//!
//! ## Features
//!
//! - **Driver agnostic**: statements are rendered to SQL text and handed to a [`Driver`]
//! - **Schema introspection**: primary keys, columns, foreign keys and inferred roles,
//!   cached per connection
//! - **Statement builder**: select / store (insert-or-update) / update / delete / truncate
//!   from a table name plus key values or `field = value` criteria
//! - **Role references**: `#id`, `#description`, `#active` resolve to the actual column
//! - **Tree queries**: correlated nested selects in the field list run as separate
//!   statements and come back attached to their parent rows
//! - **Safe defaults**: DELETE and UPDATE require criteria, UPDATE requires SET
//! - **Query monitoring**: timing, `tracing` events and pluggable monitors
//!
//! ## Tree queries
//!
//! ```ignore
//! use sqltree::{Connection, Params};
//!
//! let conn = Connection::new(driver);
//! let departments = conn
//!     .query(
//!         "SELECT id, name, \
//!          (SELECT id, name FROM employees WHERE department_id = departments.id) AS staff \
//!          FROM departments",
//!         Params::None,
//!     )
//!     .await?
//!     .into_result_set()?;
//!
//! for department in departments.rows() {
//!     let staff = department.children("staff").map_or(0, |s| s.len());
//!     println!("{}: {staff} employees", department.value("name").unwrap());
//! }
//! ```
//!
//! ## Statement builder
//!
//! ```ignore
//! use sqltree::{Criteria, StoreRows};
//!
//! let stmt = conn.prepare_select("users", &["#description"], 7, None).await?;
//! let stmt = conn.prepare_store("users", StoreRows::record([("name", "amy")])).await?;
//! let stmt = conn.prepare_update("users", 7, [("#active", false)]).await?;
//! let stmt = conn.prepare_delete("users", Criteria::fields([("name", "amy")])).await?;
//! conn.query(stmt, ()).await?;
//! ```

pub mod builder;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod meta;
pub mod monitor;
pub mod query;
pub mod quote;
pub mod result;
mod splitter;
pub mod table;
pub mod transaction;
pub mod tree;
pub mod value;

#[cfg(test)]
mod testing;

pub use builder::{
    Criteria, DeleteBuilder, DeleteScope, FieldRef, SelectBuilder, SqlBuilder, Statement,
    StoreBuilder, StoreRows, UpdateBuilder, WhereBuilder,
};
pub use config::{ConnectionConfig, RoleConventions};
pub use connection::Connection;
pub use driver::{Driver, DriverColumn, DriverError, DriverOutput, RowCursor};
pub use error::{DbError, DbResult};
pub use meta::{FieldMetadata, FieldRole, FieldType, TableMetadata, TableRole};
pub use monitor::{
    CompositeMonitor, NoopMonitor, QueryContext, QueryMonitor, QueryResult, QueryStats,
    QueryType, StatsMonitor, TracingMonitor,
};
pub use quote::{Identifier, MySqlQuoter, Quoter};
pub use result::{
    Cell, ColumnDesc, ColumnKind, NestedNode, Outcome, ResultSet, ResultShape, Row,
};
pub use splitter::{Params, bind};
pub use table::Table;
pub use tree::{ChildQuery, QueryTree, Slot, extract_tree};
pub use value::Value;
