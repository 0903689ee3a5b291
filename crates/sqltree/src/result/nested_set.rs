use super::shape::{LEFT_BOUND, RIGHT_BOUND};
use super::{ResultSet, Row};
use crate::error::{DbError, DbResult};
use serde::Serialize;

/// A row of a nested-set result with the rows it encloses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedNode {
    pub row: Row,
    pub children: Vec<NestedNode>,
}

fn bound(row: &Row, column: &str) -> DbResult<i64> {
    let value = row
        .value(column)
        .ok_or_else(|| DbError::decode(column, "column is missing"))?;
    value
        .as_i64()
        .ok_or_else(|| DbError::decode(column, format!("'{value}' is not an integer bound")))
}

fn attach(stack: &mut [(i64, NestedNode)], roots: &mut Vec<NestedNode>, node: NestedNode) {
    match stack.last_mut() {
        Some((_, parent)) => parent.children.push(node),
        None => roots.push(node),
    }
}

impl ResultSet {
    /// Build the hierarchy encoded by the `tree:left` / `tree:right` columns.
    ///
    /// Rows may come in any order. Bounds that are not integers, are reversed,
    /// or overlap without nesting are decode errors.
    pub fn nested_set(&self) -> DbResult<Vec<NestedNode>> {
        let mut items = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let (left, right) = (bound(row, LEFT_BOUND)?, bound(row, RIGHT_BOUND)?);
            if left >= right {
                return Err(DbError::decode(
                    LEFT_BOUND,
                    format!("left bound {left} is not below right bound {right}"),
                ));
            }
            items.push((left, right, row));
        }
        items.sort_by_key(|(left, _, _)| *left);

        let mut roots = Vec::new();
        let mut stack: Vec<(i64, NestedNode)> = Vec::new();
        for (left, right, row) in items {
            while stack.last().is_some_and(|(top, _)| *top < left) {
                if let Some((_, node)) = stack.pop() {
                    attach(&mut stack, &mut roots, node);
                }
            }
            if let Some((top, _)) = stack.last() {
                if right > *top {
                    return Err(DbError::decode(
                        RIGHT_BOUND,
                        format!("node ({left}, {right}) overlaps its parent ending at {top}"),
                    ));
                }
            }
            stack.push((
                right,
                NestedNode {
                    row: row.clone(),
                    children: Vec::new(),
                },
            ));
        }
        while let Some((_, node)) = stack.pop() {
            attach(&mut stack, &mut roots, node);
        }
        Ok(roots)
    }
}
