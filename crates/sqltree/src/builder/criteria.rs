//! Abstract inputs to the statement builder.

use crate::error::{DbError, DbResult};
use crate::meta::{FieldRole, TableMetadata};
use crate::value::Value;

/// Which rows a statement applies to.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Criteria {
    /// All rows.
    #[default]
    None,
    /// Primary key value(s), matched positionally to the key columns.
    Key(Vec<Value>),
    /// `field = value` pairs. Field names may be role references (`#id`).
    Fields(Vec<(String, Value)>),
}

impl Criteria {
    /// A single-column key value.
    pub fn key(value: impl Into<Value>) -> Self {
        Self::Key(vec![value.into()])
    }

    /// Values for a (composite) primary key, in key order.
    pub fn keys<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::Key(values.into_iter().map(Into::into).collect())
    }

    pub fn fields<I, K, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Self::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub(crate) fn has_role_refs(&self) -> bool {
        match self {
            Self::Fields(pairs) => pairs.iter().any(|(name, _)| FieldRef::is_role_ref(name)),
            _ => false,
        }
    }
}

macro_rules! impl_criteria_from_key {
    ($($t:ty),*) => {
        $(impl From<$t> for Criteria {
            fn from(v: $t) -> Self {
                Self::key(v)
            }
        })*
    };
}

impl_criteria_from_key!(i32, i64, u32, u64, &str, String);

impl From<Vec<Value>> for Criteria {
    fn from(values: Vec<Value>) -> Self {
        Self::Key(values)
    }
}

impl From<()> for Criteria {
    fn from(_: ()) -> Self {
        Self::None
    }
}

/// A field name as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Literal(String),
    /// `#role`: the column carrying that role.
    Role(FieldRole),
}

impl FieldRef {
    pub const ROLE_MARKER: char = '#';

    pub fn parse(name: &str) -> DbResult<Self> {
        match name.trim().strip_prefix(Self::ROLE_MARKER) {
            Some(role) => role
                .parse()
                .map(Self::Role)
                .map_err(|_| DbError::usage(format!("Unknown field '{}'", name.trim()))),
            None => Ok(Self::Literal(name.to_string())),
        }
    }

    pub(crate) fn is_role_ref(name: &str) -> bool {
        name.trim_start().starts_with(Self::ROLE_MARKER)
    }

    /// The concrete column name in `meta`.
    pub fn resolve(&self, meta: &TableMetadata) -> DbResult<String> {
        match self {
            Self::Literal(name) => Ok(name.clone()),
            Self::Role(role) => meta
                .field_by_role(*role)
                .map(|f| f.name.clone())
                .ok_or_else(|| {
                    DbError::usage(format!(
                        "Unknown field '#{role}': table '{}' has no field with that role",
                        meta.table
                    ))
                }),
        }
    }
}

/// Rows for an insert-or-update.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRows {
    /// One record as `field = value` pairs.
    Record(Vec<(String, Value)>),
    /// Positional rows. Without `fields` the values follow the table's
    /// column order.
    Rows {
        fields: Option<Vec<String>>,
        rows: Vec<Vec<Value>>,
    },
}

impl StoreRows {
    pub fn record<I, K, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Self::Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// One row in table column order.
    pub fn values<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::Rows {
            fields: None,
            rows: vec![values.into_iter().map(Into::into).collect()],
        }
    }

    /// Explicit field list plus any number of rows.
    pub fn bulk<F, S>(fields: F, rows: Vec<Vec<Value>>) -> Self
    where
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Rows {
            fields: Some(fields.into_iter().map(Into::into).collect()),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Record(pairs) => pairs.is_empty(),
            Self::Rows { rows, .. } => rows.is_empty(),
        }
    }
}

/// What a delete removes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteScope {
    /// Empty the whole table with `TRUNCATE`.
    Truncate,
    Matching(Criteria),
}

impl From<Criteria> for DeleteScope {
    fn from(criteria: Criteria) -> Self {
        Self::Matching(criteria)
    }
}

/// No criteria: refused by the delete builder, use [`DeleteScope::Truncate`].
impl From<()> for DeleteScope {
    fn from(_: ()) -> Self {
        Self::Matching(Criteria::None)
    }
}
