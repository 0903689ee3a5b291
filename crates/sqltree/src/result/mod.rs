//! Materialized query results.
//!
//! A [`ResultSet`] is fully built before it is returned. Cells of tree
//! results hold the assembled child results next to the plain values.

mod nested_set;
mod shape;

pub use nested_set::NestedNode;
pub use shape::{LEFT_BOUND, RIGHT_BOUND, ResultShape, classify_shape};

use crate::driver::DriverColumn;
use crate::error::{DbError, DbResult};
use crate::value::Value;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// What a column of a result holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Value,
    /// A filtered child query: a set of rows per row.
    Children,
    /// A lookup child query: at most one row (or value) per row.
    Lookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDesc {
    pub name: String,
    pub table: Option<String>,
    pub native_type: String,
    pub kind: ColumnKind,
}

impl ColumnDesc {
    pub(crate) fn child(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            table: None,
            native_type: String::new(),
            kind,
        }
    }
}

impl From<&DriverColumn> for ColumnDesc {
    fn from(column: &DriverColumn) -> Self {
        Self {
            name: column.name.clone(),
            table: column.table.clone(),
            native_type: column.native_type.clone(),
            kind: ColumnKind::Value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    /// Child rows of this row.
    Rows(ResultSet),
    /// The row found by a lookup child, if any.
    Row(Option<Box<Row>>),
}

impl Cell {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rows(&self) -> Option<&ResultSet> {
        match self {
            Self::Rows(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Self::Row(row) => row.as_deref(),
            _ => None,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Rows(set) => set.serialize(serializer),
            Self::Row(row) => row.serialize(serializer),
        }
    }
}

/// One result row. Columns are shared with the other rows of its set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[ColumnDesc]>,
    cells: Vec<Cell>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[ColumnDesc]>, cells: Vec<Cell>) -> Self {
        Self { columns, cells }
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell of the first column named `name`.
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| self.cells.get(i))
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Cell::as_value)
    }

    /// Child rows attached under `name`.
    pub fn children(&self, name: &str) -> Option<&ResultSet> {
        self.get(name).and_then(Cell::as_rows)
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, cell) in self.columns.iter().zip(&self.cells) {
            map.serialize_entry(&column.name, cell)?;
        }
        map.end()
    }
}

/// Rows returned by a query, with their column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    shape: ResultShape,
    columns: Arc<[ColumnDesc]>,
    rows: Vec<Row>,
    statement: String,
    base_table: Option<String>,
}

impl ResultSet {
    pub(crate) fn new(
        shape: ResultShape,
        columns: Arc<[ColumnDesc]>,
        rows: Vec<Row>,
        statement: impl Into<String>,
    ) -> Self {
        Self {
            shape,
            columns,
            rows,
            statement: statement.into(),
            base_table: None,
        }
    }

    /// A set without rows sharing the layout of `self`.
    pub(crate) fn empty_like(&self) -> Self {
        Self {
            rows: Vec::new(),
            ..self.clone_layout()
        }
    }

    pub(crate) fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..self.clone_layout()
        }
    }

    fn clone_layout(&self) -> Self {
        Self {
            shape: self.shape,
            columns: Arc::clone(&self.columns),
            rows: Vec::new(),
            statement: self.statement.clone(),
            base_table: self.base_table.clone(),
        }
    }

    pub(crate) fn with_base_table(mut self, table: Option<&str>) -> Self {
        self.base_table = table.map(str::to_string);
        self
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// The statement that produced this set.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// The table the statement was prepared for, if known.
    pub fn base_table(&self) -> Option<&str> {
        self.base_table.as_deref()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// All cells of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.field_index(name)?;
        Some(self.rows.iter().filter_map(|r| r.cells.get(index)).collect())
    }

    pub fn to_json(&self) -> DbResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| DbError::Other(e.to_string()))
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

/// What running a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(ResultSet),
    /// Rows affected by a statement that returns no rows.
    Affected(u64),
    /// Id generated by an insert.
    Inserted(u64),
}

impl Outcome {
    pub fn into_result_set(self) -> DbResult<ResultSet> {
        match self {
            Self::Rows(set) => Ok(set),
            other => Err(DbError::usage(format!(
                "Statement did not return a result set ({other:?})"
            ))),
        }
    }

    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::Affected(n) => Some(*n),
            _ => None,
        }
    }

    pub fn last_insert_id(&self) -> Option<u64> {
        match self {
            Self::Inserted(id) => Some(*id),
            _ => None,
        }
    }
}
