//! Statement builder.
//!
//! The builders here render MySQL statements from resolved column names and
//! values. [`Connection`](crate::Connection) wraps them with `prepare_*`
//! methods that resolve primary keys and `#role` field references first.
//!
//! ## Design
//!
//! - Values are quoted into the text; there are no server-side parameters.
//! - Safe defaults: DELETE and UPDATE require a WHERE condition, UPDATE
//!   requires SET. Emptying a table is an explicit `TRUNCATE`.
//! - Store is insert-or-update (`ON DUPLICATE KEY UPDATE`).

mod criteria;
mod delete;
mod prepare;
mod select;
mod statement;
mod store;
mod traits;
mod update;
mod where_builder;

pub use criteria::{Criteria, DeleteScope, FieldRef, StoreRows};
pub use delete::DeleteBuilder;
pub use select::SelectBuilder;
pub use statement::Statement;
pub use store::StoreBuilder;
pub use traits::SqlBuilder;
pub use update::UpdateBuilder;
pub use where_builder::WhereBuilder;
