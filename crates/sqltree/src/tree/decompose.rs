//! Splitting a SELECT with nested selects into a query tree.
//!
//! A nested select in the field list is a child query when it is the whole
//! field (optionally aliased) and its WHERE clause holds exactly one
//! `column = parent.column` condition against the primary table.

use crate::builder::Statement;
use crate::error::{DbError, DbResult};
use crate::quote::Quoter;
use crate::splitter::{
    find_keyword, from_table, is_ident_byte, keyword_len_at, matching_paren, split_conjunction,
    split_select, split_top_level, split_where, starts_with_keyword, strip_sql_prefix,
};
use regex::Regex;
use std::sync::OnceLock;

/// Named placeholder in child statements that receives the parent values.
pub(crate) const PARENT_PLACEHOLDER: &str = "tree_parent";

/// An output position of a tree query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Field `n` of the primary statement.
    Field(usize),
    /// Field `n` is a wildcard; it covers however many columns the result has.
    Wildcard(usize),
    /// Child query `n`.
    Child(usize),
}

/// A nested select, split off from its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildQuery {
    /// The child statement (holding the `:tree_parent` placeholder) and its own children.
    pub tree: QueryTree,
    /// Field of the parent statement supplying the correlation values.
    pub source_field: usize,
    /// Output position of the assembled child result.
    pub target_field: usize,
    /// `true`: one query for all parent values; `false`: one lookup per value.
    pub filter: bool,
    /// A lookup selecting a single field yields that value instead of a row.
    pub scalar: bool,
    /// Output column name.
    pub name: String,
}

/// A statement decomposed into a primary statement and child queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    pub primary: Statement,
    /// Field list of the primary statement, hidden fields last. Empty when
    /// the statement runs as is.
    pub fields: Vec<String>,
    /// Output layout, in the order the fields were written.
    pub slots: Vec<Slot>,
    pub children: Vec<ChildQuery>,
    /// Hidden field carrying the correlation value of a filtered child.
    pub key_field: Option<usize>,
}

impl QueryTree {
    fn passthrough(sql: &str) -> Self {
        Self {
            primary: Statement::new(sql),
            fields: Vec::new(),
            slots: Vec::new(),
            children: Vec::new(),
            key_field: None,
        }
    }

    /// Whether the primary statement's columns are returned unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of statements in the tree, counting every level.
    pub fn statement_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|c| c.tree.statement_count())
            .sum::<usize>()
    }

    pub(crate) fn wildcard(&self) -> Option<usize> {
        self.slots.iter().find_map(|s| match s {
            Slot::Wildcard(p) => Some(*p),
            _ => None,
        })
    }
}

/// Split `sql` into a primary statement and one child per nested select.
///
/// Text that is not a SELECT, or has no nested selects, yields a tree without
/// children running `sql` unchanged. Children are decomposed recursively, so
/// any malformed level fails here, before anything runs.
pub fn extract_tree(sql: &str, quoter: &dyn Quoter) -> DbResult<QueryTree> {
    decompose(sql, quoter, None)
}

enum Entry<'a> {
    Plain(&'a str),
    Nested {
        inner: &'a str,
        alias: Option<String>,
        text: &'a str,
    },
}

fn decompose(sql: &str, quoter: &dyn Quoter, key: Option<&str>) -> DbResult<QueryTree> {
    let Some(parts) = split_select(sql)? else {
        return Ok(QueryTree::passthrough(sql));
    };
    let entries = split_top_level(parts.fields, b',')?
        .into_iter()
        .map(classify_field)
        .collect::<DbResult<Vec<_>>>()?;
    let nested_count = entries
        .iter()
        .filter(|e| matches!(e, Entry::Nested { .. }))
        .count();
    if nested_count == 0 && key.is_none() {
        return Ok(QueryTree::passthrough(sql));
    }

    let mut fields: Vec<String> = Vec::new();
    let mut slots = Vec::with_capacity(entries.len());
    let mut nested = Vec::with_capacity(nested_count);
    for entry in entries {
        match entry {
            Entry::Plain(field) => {
                let index = fields.len();
                fields.push(field.to_string());
                slots.push(if is_wildcard(field, quoter) {
                    Slot::Wildcard(index)
                } else {
                    Slot::Field(index)
                });
            }
            Entry::Nested { inner, alias, text } => {
                slots.push(Slot::Child(nested.len()));
                nested.push((slots.len() - 1, inner, alias, text));
            }
        }
    }
    if slots.iter().filter(|s| matches!(s, Slot::Wildcard(_))).count() > 1 {
        return Err(DbError::parse(format!(
            "Only one wildcard field may be combined with nested selects in '{}'",
            sql.trim()
        )));
    }

    let mut children = Vec::with_capacity(nested.len());
    if !nested.is_empty() {
        let qualifier = match from_table(parts.tail, quoter)? {
            Some((name, alias)) => alias.unwrap_or(name),
            None => {
                return Err(DbError::parse(format!(
                    "Can't determine the table of '{}' to correlate nested selects with",
                    sql.trim()
                )));
            }
        };

        for (target_field, inner, alias, text) in nested {
            let correlation = correlate(inner, &qualifier, quoter)?;
            let found = find_source(&fields, &qualifier, &correlation.parent_name, quoter);
            let source_field = match found {
                Some(index) => index,
                None => {
                    fields.push(correlation.parent_column.clone());
                    fields.len() - 1
                }
            };
            let tree = decompose(
                &correlation.sql,
                quoter,
                correlation.filter.then_some(correlation.child_key.as_str()),
            )?;
            let scalar = !correlation.filter && single_field(&correlation.sql, quoter)?;
            children.push(ChildQuery {
                tree,
                source_field,
                target_field,
                filter: correlation.filter,
                scalar,
                name: alias
                    .or(correlation.table)
                    .unwrap_or_else(|| text.to_string()),
            });
        }
    }

    let mut key_field = None;
    if let Some(key) = key {
        fields.push(key.to_string());
        key_field = Some(fields.len() - 1);
    }

    let tail = parts.tail.trim_start();
    let mut primary = format!("{} {}", parts.head.trim_end(), fields.join(", "));
    if !tail.is_empty() {
        primary.push(' ');
        primary.push_str(tail);
    }

    Ok(QueryTree {
        primary: Statement::new(primary),
        fields,
        slots,
        children,
        key_field,
    })
}

/// A field is a child query when it is a parenthesized SELECT with at most an alias.
fn classify_field(field: &str) -> DbResult<Entry<'_>> {
    if !field.starts_with('(') {
        return Ok(Entry::Plain(field));
    }
    let close = matching_paren(field, 0)?;
    let inner = &field[1..close];
    if !starts_with_keyword(strip_sql_prefix(inner), "SELECT") {
        return Ok(Entry::Plain(field));
    }
    Ok(match trailing_alias(&field[close + 1..]) {
        Some(alias) => Entry::Nested {
            inner,
            alias,
            text: field,
        },
        None => Entry::Plain(field),
    })
}

/// `Some(None)` for no alias, `Some(Some(a))` for `[AS] a`, `None` for anything else.
fn trailing_alias(rest: &str) -> Option<Option<String>> {
    let mut s = rest.trim();
    if s.is_empty() {
        return Some(None);
    }
    if let Some(len) = keyword_len_at(s, 0, "AS") {
        s = s[len..].trim_start();
    }
    if let Some(quoted) = s.strip_prefix('`') {
        let end = quoted.find('`')?;
        return (end > 0 && end + 2 == s.len()).then(|| Some(quoted[..end].to_string()));
    }
    (!s.is_empty() && s.bytes().all(is_ident_byte)).then(|| Some(s.to_string()))
}

fn single_field(sql: &str, quoter: &dyn Quoter) -> DbResult<bool> {
    let Some(parts) = split_select(sql)? else {
        return Ok(false);
    };
    let fields = split_top_level(parts.fields, b',')?;
    Ok(match fields.as_slice() {
        [field] => {
            !is_wildcard(field, quoter) && matches!(classify_field(field)?, Entry::Plain(_))
        }
        _ => false,
    })
}

fn is_wildcard(field: &str, quoter: &dyn Quoter) -> bool {
    field.ends_with('*') && quoter.valid_identifier(field, None, false)
}

/// Index of a field selecting `parent_name` of the qualifier table.
fn find_source(
    fields: &[String],
    qualifier: &str,
    parent_name: &str,
    quoter: &dyn Quoter,
) -> Option<usize> {
    fields.iter().position(|field| {
        if is_wildcard(field, quoter) || !quoter.valid_identifier(field, None, true) {
            return false;
        }
        let ident = quoter.split_identifier(field);
        ident.name.eq_ignore_ascii_case(parent_name)
            && ident
                .group
                .is_none_or(|g| g.eq_ignore_ascii_case(qualifier))
    })
}

struct Correlation {
    /// Child statement with the correlation replaced by the placeholder.
    sql: String,
    /// Parent side as written (`departments.id`).
    parent_column: String,
    /// Column name of the parent side (`id`).
    parent_name: String,
    /// Child side as written (`department_id`).
    child_key: String,
    filter: bool,
    /// Table of the child statement.
    table: Option<String>,
}

fn equality_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let ident = r"(?:`[^`]+`|[A-Za-z_][A-Za-z0-9_$]*)";
        let column = format!(r"{ident}(?:\.{ident})*");
        Regex::new(&format!(r"^\s*({column})\s*=\s*({column})\s*$"))
            .expect("invalid built-in correlation regex")
    })
}

/// Blank out the contents of string literals.
fn mask_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote = None;
    let mut escaped = false;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if c == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if c == q {
                    quote = None;
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

fn references_qualifier(condition: &str, qualifier: &str) -> DbResult<bool> {
    let q = regex::escape(qualifier);
    let re = Regex::new(&format!(r"(?i)(?:^|[^\w$.`])(?:`{q}`|{q})\s*\."))
        .map_err(|e| DbError::parse(e.to_string()))?;
    Ok(re.is_match(&mask_literals(condition)))
}

/// `(child side, parent side)` of a `a = b` condition with exactly one side on the qualifier.
fn match_equality<'a>(
    condition: &'a str,
    qualifier: &str,
    quoter: &dyn Quoter,
) -> Option<(&'a str, &'a str)> {
    let caps = equality_regex().captures(condition)?;
    let (a, b) = (caps.get(1)?.as_str(), caps.get(2)?.as_str());
    let on_parent = |side: &str| {
        quoter
            .split_identifier(side)
            .group
            .is_some_and(|g| g.eq_ignore_ascii_case(qualifier))
    };
    match (on_parent(a), on_parent(b)) {
        (false, true) => Some((a, b)),
        (true, false) => Some((b, a)),
        _ => None,
    }
}

fn correlate(inner: &str, qualifier: &str, quoter: &dyn Quoter) -> DbResult<Correlation> {
    let statement = inner.trim();
    let parts = split_select(inner)?
        .ok_or_else(|| DbError::parse(format!("Nested statement '{statement}' is not a SELECT")))?;
    let where_parts = split_where(parts.tail)?;
    let no_correlation = || {
        DbError::parse(format!(
            "Nested select '{statement}' has no correlation with '{qualifier}'"
        ))
    };
    let condition = where_parts.condition.ok_or_else(no_correlation)?;

    let mut found = None;
    for part in split_conjunction(condition)? {
        if let Some((child, parent)) = match_equality(part, qualifier, quoter) {
            if found.is_some() {
                return Err(DbError::parse(format!(
                    "Nested select '{statement}' correlates with '{qualifier}' more than once"
                )));
            }
            found = Some((part, child, parent));
        } else if references_qualifier(part, qualifier)? {
            return Err(DbError::parse(format!(
                "Unsupported correlation '{part}' in nested select: only \
                 `column = {qualifier}.column` is supported"
            )));
        }
    }
    let (part, child_key, parent_column) = found.ok_or_else(no_correlation)?;

    // A lookup child ends with LIMIT 1. Without ORDER BY the limit is raised
    // to 2 so a lookup matching several rows is detected. Any other limit
    // would apply across all parents of a batched child.
    let base = inner.as_ptr() as usize;
    let mut limit_digit = None;
    if let Some((pos, len)) = find_keyword(where_parts.after, &["LIMIT"], 0)? {
        let rest = &where_parts.after[pos + len..];
        if rest.trim() != "1" {
            return Err(DbError::parse(format!(
                "Unsupported LIMIT in nested select '{statement}': only LIMIT 1 is supported"
            )));
        }
        let digit = rest.as_ptr() as usize - base + (rest.len() - rest.trim_start().len());
        let ordered = find_keyword(where_parts.after, &["ORDER BY"], 0)?.is_some();
        limit_digit = Some((digit, ordered));
    }
    if find_keyword(where_parts.after, &["OFFSET"], 0)?.is_some() {
        return Err(DbError::parse(format!(
            "Unsupported OFFSET in nested select '{statement}'"
        )));
    }
    let filter = limit_digit.is_none();

    let mut sql = inner.to_string();
    if let Some((digit, false)) = limit_digit {
        sql.replace_range(digit..digit + 1, "2");
    }
    if filter {
        if let Some((at, text)) = group_by_key(parts.fields, where_parts.after, child_key)? {
            let at = where_parts.after.as_ptr() as usize - base + at;
            sql.insert_str(at, &text);
        }
    }
    let offset = part.as_ptr() as usize - base;
    let replacement = if filter {
        format!("{child_key} IN (:{PARENT_PLACEHOLDER})")
    } else {
        format!("{child_key} = :{PARENT_PLACEHOLDER}")
    };
    sql.replace_range(offset..offset + part.len(), &replacement);

    Ok(Correlation {
        sql: sql.trim().to_string(),
        parent_column: parent_column.to_string(),
        parent_name: quoter.split_identifier(parent_column).name,
        child_key: child_key.to_string(),
        filter,
        table: from_table(parts.tail, quoter)?.map(|(name, _)| name),
    })
}

/// Keywords that end a GROUP BY list.
const GROUP_BY_END: &[&str] = &[
    "WITH ROLLUP",
    "HAVING",
    "WINDOW",
    "ORDER BY",
    "LIMIT",
    "PROCEDURE",
    "INTO",
    "FOR UPDATE",
    "LOCK IN SHARE MODE",
    "UNION",
];

fn aggregate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:COUNT|SUM|AVG|MIN|MAX|GROUP_CONCAT|BIT_AND|BIT_OR|BIT_XOR|STD|STDDEV|STDDEV_POP|STDDEV_SAMP|VARIANCE|VAR_POP|VAR_SAMP|JSON_ARRAYAGG|JSON_OBJECTAGG)\s*\(",
        )
        .expect("invalid built-in aggregate regex")
    })
}

fn window_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bOVER\b").expect("invalid built-in window regex"))
}

/// Whether a plain field of the list aggregates over rows.
fn has_aggregate(fields: &str) -> DbResult<bool> {
    for field in split_top_level(fields, b',')? {
        if let Entry::Plain(field) = classify_field(field)? {
            let masked = mask_literals(field);
            if aggregate_regex().is_match(&masked) && !window_regex().is_match(&masked) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Where and what to insert into `after` so a batched child groups per
/// correlation value: the key joins an existing GROUP BY list, and an
/// aggregating child without one gets `GROUP BY key`.
fn group_by_key(fields: &str, after: &str, key: &str) -> DbResult<Option<(usize, String)>> {
    if let Some((pos, len)) = find_keyword(after, &["GROUP BY"], 0)? {
        let start = pos + len;
        let end = find_keyword(after, GROUP_BY_END, start)?.map_or(after.len(), |(p, _)| p);
        let at = start + after[start..end].trim_end().len();
        return Ok(Some((at, format!(", {key}"))));
    }
    if !has_aggregate(fields)? {
        return Ok(None);
    }
    Ok(Some(if after.trim().is_empty() {
        (0, format!(" GROUP BY {key}"))
    } else {
        let at = after.len() - after.trim_start().len();
        (at, format!("GROUP BY {key} "))
    }))
}
