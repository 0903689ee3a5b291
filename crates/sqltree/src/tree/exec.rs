//! Running a query tree and assembling its result.

use super::decompose::{ChildQuery, PARENT_PLACEHOLDER, QueryTree, Slot};
use crate::connection::Connection;
use crate::driver::{Driver, DriverOutput};
use crate::error::{DbError, DbResult};
use crate::monitor::QueryContext;
use crate::result::{Cell, ColumnDesc, ColumnKind, Outcome, ResultSet, ResultShape, Row, classify_shape};
use crate::splitter::bind_one;
use crate::value::Value;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

const CHILD_TAG: &str = "tree.child";

/// Outcome of one tree level, with the correlation keys of its rows.
struct Executed {
    outcome: Outcome,
    keys: Vec<Value>,
}

/// Maps primary fields to result columns.
///
/// A wildcard field covers `expanded` columns; fields after it shift.
struct Layout {
    wildcard: Option<usize>,
    expanded: usize,
}

impl Layout {
    fn new(tree: &QueryTree, width: usize, sql: &str) -> DbResult<Self> {
        let fields = tree.fields.len();
        match tree.wildcard() {
            Some(p) if width + 1 >= fields => Ok(Self {
                wildcard: Some(p),
                expanded: width + 1 - fields,
            }),
            None if width == fields => Ok(Self {
                wildcard: None,
                expanded: 1,
            }),
            _ => Err(DbError::Other(format!(
                "Statement returned {width} columns for {fields} fields: {sql}"
            ))),
        }
    }

    fn column(&self, field: usize) -> usize {
        match self.wildcard {
            Some(p) if field > p => field + self.expanded - 1,
            _ => field,
        }
    }

    fn span(&self, field: usize) -> Range<usize> {
        let start = self.column(field);
        if self.wildcard == Some(field) {
            start..start + self.expanded
        } else {
            start..start + 1
        }
    }
}

fn empty_lookup(child: &ChildQuery) -> Cell {
    if child.scalar {
        Cell::Value(Value::Null)
    } else {
        Cell::Row(None)
    }
}

impl<D: Driver> Connection<D> {
    /// Run a decomposed statement: the primary statement first, then every
    /// child in declaration order, attaching child results to the primary rows.
    ///
    /// Any failure aborts the whole call.
    pub async fn execute_tree(&self, tree: &QueryTree) -> DbResult<Outcome> {
        let sql = tree.primary.sql().to_string();
        Ok(self.run_tree(tree, sql, None).await?.outcome)
    }

    fn run_tree<'a>(
        &'a self,
        tree: &'a QueryTree,
        sql: String,
        tag: Option<&'static str>,
    ) -> BoxFuture<'a, DbResult<Executed>> {
        async move {
            let mut ctx = QueryContext::new(&sql);
            if let Some(tag) = tag {
                ctx = ctx.with_tag(tag);
            }

            let cursor = match self.run(ctx).await? {
                DriverOutput::Rows(cursor) => cursor,
                DriverOutput::Affected {
                    affected_rows,
                    last_insert_id,
                } => {
                    let outcome = match last_insert_id {
                        Some(id) if id > 0 => Outcome::Inserted(id),
                        _ => Outcome::Affected(affected_rows),
                    };
                    return Ok(Executed {
                        outcome,
                        keys: Vec::new(),
                    });
                }
            };

            if tree.is_passthrough() {
                let columns: Arc<[ColumnDesc]> = cursor.columns.iter().map(ColumnDesc::from).collect();
                let shape = classify_shape(columns.iter().map(|c| c.name.as_str()), 0);
                let rows = cursor
                    .rows
                    .into_iter()
                    .map(|row| Row::new(Arc::clone(&columns), row.into_iter().map(Cell::Value).collect()))
                    .collect();
                return Ok(Executed {
                    outcome: Outcome::Rows(ResultSet::new(shape, columns, rows, sql)),
                    keys: Vec::new(),
                });
            }

            let layout = Layout::new(tree, cursor.columns.len(), &sql)?;
            let child_cells = self.children_cells(tree, &cursor.rows, &layout).await?;

            let mut columns = Vec::new();
            for slot in &tree.slots {
                match *slot {
                    Slot::Field(f) | Slot::Wildcard(f) => {
                        let span = layout.span(f);
                        columns.extend(
                            cursor.columns[span.start..span.end.min(cursor.columns.len())]
                                .iter()
                                .map(ColumnDesc::from),
                        );
                    }
                    Slot::Child(i) => {
                        if let Some(child) = tree.children.get(i) {
                            let kind = if child.filter {
                                ColumnKind::Children
                            } else {
                                ColumnKind::Lookup
                            };
                            columns.push(ColumnDesc::child(&child.name, kind));
                        }
                    }
                }
            }
            let columns: Arc<[ColumnDesc]> = columns.into();

            let keys = match tree.key_field {
                Some(k) => {
                    let column = layout.column(k);
                    cursor
                        .rows
                        .iter()
                        .map(|row| row.get(column).cloned().unwrap_or_default())
                        .collect()
                }
                None => Vec::new(),
            };

            let mut child_iters: Vec<_> = child_cells.into_iter().map(Vec::into_iter).collect();
            let mut rows = Vec::with_capacity(cursor.rows.len());
            for row in cursor.rows {
                let mut cells = Vec::with_capacity(columns.len());
                for slot in &tree.slots {
                    match *slot {
                        Slot::Field(f) | Slot::Wildcard(f) => {
                            for c in layout.span(f) {
                                cells.push(Cell::Value(row.get(c).cloned().unwrap_or_default()));
                            }
                        }
                        Slot::Child(i) => {
                            if let Some(cell) = child_iters.get_mut(i).and_then(Iterator::next) {
                                cells.push(cell);
                            }
                        }
                    }
                }
                rows.push(Row::new(Arc::clone(&columns), cells));
            }

            let shape = classify_shape(columns.iter().map(|c| c.name.as_str()), tree.children.len());
            Ok(Executed {
                outcome: Outcome::Rows(ResultSet::new(shape, columns, rows, sql)),
                keys,
            })
        }
        .boxed()
    }

    /// Cells of every child, one per primary row, in declaration order.
    async fn children_cells(
        &self,
        tree: &QueryTree,
        rows: &[Vec<Value>],
        layout: &Layout,
    ) -> DbResult<Vec<Vec<Cell>>> {
        let concurrent = tree.children.len() > 1
            && self.config().concurrent_children
            && self.driver().supports_concurrent_statements();

        if concurrent {
            return try_join_all(
                tree.children
                    .iter()
                    .map(|child| self.child_cells(child, rows, layout.column(child.source_field))),
            )
            .await;
        }

        let mut all = Vec::with_capacity(tree.children.len());
        for child in &tree.children {
            all.push(
                self.child_cells(child, rows, layout.column(child.source_field))
                    .await?,
            );
        }
        Ok(all)
    }

    async fn child_cells(
        &self,
        child: &ChildQuery,
        rows: &[Vec<Value>],
        column: usize,
    ) -> DbResult<Vec<Cell>> {
        if child.filter {
            self.filtered_cells(child, rows, column).await
        } else {
            self.lookup_cells(child, rows, column).await
        }
    }

    fn correlation_key(&self, value: &Value) -> Option<String> {
        if self.config().case_insensitive_keys {
            value.collated_key()
        } else {
            value.group_key()
        }
    }

    /// One query for all distinct parent values; rows grouped by correlation key.
    async fn filtered_cells(
        &self,
        child: &ChildQuery,
        rows: &[Vec<Value>],
        column: usize,
    ) -> DbResult<Vec<Cell>> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for row in rows {
            if let Some(value) = row.get(column) {
                if self.correlation_key(value).is_some_and(|k| seen.insert(k)) {
                    values.push(value.clone());
                }
            }
        }

        let template = child.tree.primary.sql();
        if values.is_empty() {
            let empty = ResultSet::new(ResultShape::Flat, Arc::from(Vec::new()), Vec::new(), template);
            return Ok(rows.iter().map(|_| Cell::Rows(empty.clone())).collect());
        }

        let sql = bind_one(template, PARENT_PLACEHOLDER, &Value::List(values), self.quoter())?;
        let executed = self.run_tree(&child.tree, sql, Some(CHILD_TAG)).await?;
        let set = executed.outcome.into_result_set()?;
        let empty = set.empty_like();

        let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
        for (row, key) in set.into_rows().into_iter().zip(&executed.keys) {
            if let Some(key) = self.correlation_key(key) {
                groups.entry(key).or_default().push(row);
            }
        }

        Ok(rows
            .iter()
            .map(|row| {
                let matched = row
                    .get(column)
                    .and_then(|v| self.correlation_key(v))
                    .and_then(|k| groups.get(&k))
                    .cloned()
                    .unwrap_or_default();
                Cell::Rows(empty.with_rows(matched))
            })
            .collect())
    }

    /// One query per distinct parent value; at most one row each.
    async fn lookup_cells(
        &self,
        child: &ChildQuery,
        rows: &[Vec<Value>],
        column: usize,
    ) -> DbResult<Vec<Cell>> {
        let mut memo: HashMap<String, Cell> = HashMap::new();
        let mut cells = Vec::with_capacity(rows.len());

        for row in rows {
            let value = row.get(column).cloned().unwrap_or_default();
            let Some(key) = self.correlation_key(&value) else {
                cells.push(empty_lookup(child));
                continue;
            };
            if let Some(cell) = memo.get(&key) {
                cells.push(cell.clone());
                continue;
            }

            let sql = bind_one(child.tree.primary.sql(), PARENT_PLACEHOLDER, &value, self.quoter())?;
            let set = self
                .run_tree(&child.tree, sql, Some(CHILD_TAG))
                .await?
                .outcome
                .into_result_set()?;
            if set.len() > 1 {
                return Err(DbError::constraint(format!(
                    "Lookup '{}' resulted in {} records for {value}",
                    child.name,
                    set.len()
                )));
            }

            let cell = match set.into_rows().into_iter().next() {
                None => empty_lookup(child),
                Some(found) if child.scalar => match found.into_cells().into_iter().next() {
                    Some(Cell::Value(v)) => Cell::Value(v),
                    _ => Cell::Value(Value::Null),
                },
                Some(found) => Cell::Row(Some(Box::new(found))),
            };
            memo.insert(key, cell.clone());
            cells.push(cell);
        }
        Ok(cells)
    }
}
