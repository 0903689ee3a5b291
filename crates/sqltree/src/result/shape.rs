use serde::Serialize;

/// Left bound column of a nested-set result.
pub const LEFT_BOUND: &str = "tree:left";
/// Right bound column of a nested-set result.
pub const RIGHT_BOUND: &str = "tree:right";

/// How a result should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    #[default]
    Flat,
    /// Rows carry child results.
    Tree,
    /// Rows encode a hierarchy with left/right bounds.
    NestedSet,
}

/// Pick the shape of a result from its column names and number of child queries.
///
/// Nested-set bounds win over child queries.
pub fn classify_shape<'a, I>(columns: I, child_count: usize) -> ResultShape
where
    I: IntoIterator<Item = &'a str>,
{
    let (mut left, mut right) = (false, false);
    for name in columns {
        left |= name == LEFT_BOUND;
        right |= name == RIGHT_BOUND;
    }
    if left && right {
        ResultShape::NestedSet
    } else if child_count > 0 {
        ResultShape::Tree
    } else {
        ResultShape::Flat
    }
}
