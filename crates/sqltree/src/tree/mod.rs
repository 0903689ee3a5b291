//! Tree queries: SELECTs with correlated nested selects in the field list.
//!
//! ```sql
//! SELECT id, name,
//!        (SELECT id, name FROM employees WHERE department_id = departments.id) AS employees
//! FROM departments
//! ```
//!
//! [`extract_tree`] splits such a statement into a primary statement and one
//! child statement per nested select. Running it with
//! [`Connection::execute_tree`](crate::Connection::execute_tree) issues the
//! primary statement, then each child once for all parent values (or once per
//! value for `LIMIT 1` lookups), and attaches the child rows to their parents.

mod decompose;
mod exec;

pub use decompose::{ChildQuery, QueryTree, Slot, extract_tree};

#[cfg(test)]
mod tests;
