//! Lexical helpers for statement text.
//!
//! This is not a SQL parser. It knows enough about MySQL's lexical structure
//! (string literals, backtick identifiers, comments, parentheses) to find
//! top-level keywords and separators, split field lists, and bind placeholders
//! without touching quoted text.
//!
//! `#` line comments are not recognized: `#` is the role marker of
//! field references (`#id`).

use crate::error::{DbError, DbResult};
use crate::quote::Quoter;
use crate::value::Value;

/// Keywords that may follow `SELECT` before the field list.
const SELECT_MODIFIERS: &[&str] = &[
    "DISTINCT",
    "DISTINCTROW",
    "ALL",
    "HIGH_PRIORITY",
    "STRAIGHT_JOIN",
    "SQL_SMALL_RESULT",
    "SQL_BIG_RESULT",
    "SQL_BUFFER_RESULT",
    "SQL_NO_CACHE",
    "SQL_CALC_FOUND_ROWS",
];

/// Keywords that end a field list when a SELECT has no FROM.
const FIELD_LIST_END: &[&str] = &[
    "FROM", "INTO", "WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT", "UNION", "FOR UPDATE",
];

/// Keywords that end a WHERE clause.
const WHERE_END: &[&str] = &[
    "GROUP BY",
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

/// Words that can't be a bare table alias.
const NOT_AN_ALIAS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "CROSS", "NATURAL", "STRAIGHT_JOIN", "ON",
    "USING", "GROUP", "HAVING", "ORDER", "LIMIT", "UNION", "FOR", "LOCK", "PARTITION", "USE",
    "IGNORE", "FORCE", "WINDOW", "PROCEDURE", "INTO",
];

/// Arguments for placeholders in a statement.
///
/// Positional arguments fill `?` in order; named arguments fill `:name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Params {
    /// Positional arguments for `?` placeholders.
    pub fn positional<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Named arguments for `:name` placeholders.
    pub fn named<I, K, T>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Self::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Positional(v) => v.is_empty(),
            Self::Named(v) => v.is_empty(),
        }
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::None
    }
}

impl<T: Into<Value>> From<Vec<T>> for Params {
    fn from(values: Vec<T>) -> Self {
        Self::positional(values)
    }
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b == b'$' || b.is_ascii_alphanumeric() || b >= 0x80
}

/// Skip a quoted section starting at `start`; returns the index after the closing quote.
fn skip_quoted(bytes: &[u8], start: usize) -> DbResult<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && quote != b'`' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(DbError::parse(format!(
        "Unterminated {} in statement",
        if quote == b'`' { "quoted identifier" } else { "string literal" }
    )))
}

/// Visit every byte outside string literals, quoted identifiers and comments.
///
/// `visit(index, byte, depth)` receives the parenthesis depth *before* the
/// byte. Returning `false` stops the scan early (skipping the final balance
/// check). Fails on unbalanced parentheses or an unterminated quote/comment.
pub(crate) fn scan<F>(sql: &str, mut visit: F) -> DbResult<()>
where
    F: FnMut(usize, u8, usize) -> bool,
{
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                i = skip_quoted(bytes, i)?;
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).is_none_or(|c| c.is_ascii_whitespace()) =>
            {
                i = match bytes[i..].iter().position(|&c| c == b'\n') {
                    Some(p) => i + p + 1,
                    None => bytes.len(),
                };
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = sql[i + 2..]
                    .find("*/")
                    .ok_or_else(|| DbError::parse("Unterminated comment in statement"))?;
                i = i + 2 + end + 2;
                continue;
            }
            _ => {}
        }

        if !visit(i, b, depth) {
            return Ok(());
        }

        match b {
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    return Err(DbError::parse(format!(
                        "Unbalanced parentheses: unexpected ')' at offset {i}"
                    )));
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }

    if depth != 0 {
        return Err(DbError::parse("Unbalanced parentheses: missing ')'"));
    }
    Ok(())
}

/// Length of `keyword` if it starts at byte `i` of `sql` as a whole word.
///
/// Multi-word keywords (`GROUP BY`) match any whitespace between words.
pub(crate) fn keyword_len_at(sql: &str, i: usize, keyword: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    if i > 0 && (is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b'.') {
        return None;
    }

    let mut pos = i;
    for (n, word) in keyword.split(' ').enumerate() {
        if n > 0 {
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos == start {
                return None;
            }
        }
        let end = pos + word.len();
        if end > bytes.len() || !bytes[pos..end].eq_ignore_ascii_case(word.as_bytes()) {
            return None;
        }
        pos = end;
    }

    if pos < bytes.len() && is_ident_byte(bytes[pos]) {
        return None;
    }
    Some(pos - i)
}

/// Find the first top-level occurrence of any of `keywords` at or after `from`.
///
/// Returns the byte offset and matched length.
pub(crate) fn find_keyword(
    sql: &str,
    keywords: &[&str],
    from: usize,
) -> DbResult<Option<(usize, usize)>> {
    let mut found = None;
    scan(sql, |i, _, depth| {
        if i < from || depth > 0 {
            return true;
        }
        for kw in keywords {
            if let Some(len) = keyword_len_at(sql, i, kw) {
                found = Some((i, len));
                return false;
            }
        }
        true
    })?;
    Ok(found)
}

/// Strip leading whitespace and comments (`--` and `/* */`).
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            match s.find('\n') {
                Some(pos) => {
                    s = &s[pos + 1..];
                    continue;
                }
                None => return "",
            }
        }
        if s.starts_with("/*") {
            match s.find("*/") {
                Some(pos) => {
                    s = &s[pos + 2..];
                    continue;
                }
                None => return "",
            }
        }
        if s == before {
            break;
        }
    }
    s
}

/// Check whether `sql` starts with `keyword` as a whole word (case-insensitive).
pub(crate) fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    keyword_len_at(sql, 0, keyword).is_some()
}

/// Split on a separator byte at parenthesis depth 0.
///
/// Parts are trimmed. An empty part (e.g. `a,,b`) is a parse error.
pub(crate) fn split_top_level(sql: &str, sep: u8) -> DbResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    scan(sql, |i, b, depth| {
        if b == sep && depth == 0 {
            parts.push(&sql[start..i]);
            start = i + 1;
        }
        true
    })?;
    parts.push(&sql[start..]);

    let parts: Vec<&str> = parts.into_iter().map(str::trim).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(DbError::parse(format!(
            "Empty element in list '{}'",
            sql.trim()
        )));
    }
    Ok(parts)
}

/// Byte offset of the `)` matching the `(` at `open`.
pub(crate) fn matching_paren(sql: &str, open: usize) -> DbResult<usize> {
    let mut close = None;
    let mut base = None;
    scan(sql, |i, b, depth| {
        if i == open {
            base = Some(depth);
        } else if let Some(d) = base {
            if b == b')' && depth == d + 1 {
                close = Some(i);
                return false;
            }
        }
        true
    })?;
    close.ok_or_else(|| DbError::parse("Unbalanced parentheses: missing ')'"))
}

/// A SELECT statement cut into its field list and the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SelectParts<'a> {
    /// `SELECT` plus modifiers (and any leading comments).
    pub head: &'a str,
    /// The field list.
    pub fields: &'a str,
    /// Everything from `FROM` onwards (may be empty).
    pub tail: &'a str,
}

/// Cut a SELECT statement; returns `None` for any other statement.
pub(crate) fn split_select(sql: &str) -> DbResult<Option<SelectParts<'_>>> {
    let body = strip_sql_prefix(sql);
    if !starts_with_keyword(body, "SELECT") {
        return Ok(None);
    }
    let offset = sql.len() - body.len();
    let bytes = sql.as_bytes();

    let mut fields_start = offset + "SELECT".len();
    loop {
        let mut pos = fields_start;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match SELECT_MODIFIERS
            .iter()
            .find_map(|m| keyword_len_at(sql, pos, m))
        {
            Some(len) => fields_start = pos + len,
            None => break,
        }
    }

    let fields_end = match find_keyword(sql, FIELD_LIST_END, fields_start)? {
        Some((pos, _)) => pos,
        None => sql.len(),
    };

    Ok(Some(SelectParts {
        head: &sql[..fields_start],
        fields: &sql[fields_start..fields_end],
        tail: &sql[fields_end..],
    }))
}

/// A tail (`FROM ...`) cut around its WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WhereParts<'a> {
    /// Text before `WHERE` (or before the clause that would follow it).
    pub before: &'a str,
    /// The condition, without the `WHERE` keyword.
    pub condition: Option<&'a str>,
    /// Text after the condition.
    pub after: &'a str,
}

pub(crate) fn split_where(tail: &str) -> DbResult<WhereParts<'_>> {
    let Some((pos, len)) = find_keyword(tail, &["WHERE"], 0)? else {
        let end = find_keyword(tail, WHERE_END, 0)?.map_or(tail.len(), |(p, _)| p);
        return Ok(WhereParts {
            before: &tail[..end],
            condition: None,
            after: &tail[end..],
        });
    };

    let start = pos + len;
    let end = find_keyword(tail, WHERE_END, start)?.map_or(tail.len(), |(p, _)| p);
    Ok(WhereParts {
        before: &tail[..pos],
        condition: Some(tail[start..end].trim()),
        after: &tail[end..],
    })
}

/// Split a condition on top-level `AND`, leaving `BETWEEN x AND y` intact.
pub(crate) fn split_conjunction(condition: &str) -> DbResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut pending_between = false;
    let mut skip_until = 0;

    scan(condition, |i, _, depth| {
        if i < skip_until || depth > 0 {
            return true;
        }
        if let Some(len) = keyword_len_at(condition, i, "BETWEEN") {
            pending_between = true;
            skip_until = i + len;
        } else if let Some(len) = keyword_len_at(condition, i, "AND") {
            if pending_between {
                pending_between = false;
            } else {
                parts.push(condition[start..i].trim());
                start = i + len;
            }
            skip_until = i + len;
        }
        true
    })?;
    parts.push(condition[start..].trim());

    if parts.iter().any(|p| p.is_empty()) {
        return Err(DbError::parse(format!(
            "Incomplete condition '{}'",
            condition.trim()
        )));
    }
    Ok(parts)
}

/// The first table of a `FROM` clause: `(name, alias)`.
pub(crate) fn from_table(tail: &str, quoter: &dyn Quoter) -> DbResult<Option<(String, Option<String>)>> {
    let Some((pos, len)) = find_keyword(tail, &["FROM"], 0)? else {
        return Ok(None);
    };
    let rest = tail[pos + len..].trim_start();
    if rest.starts_with('(') {
        // Derived table: only an alias can name it.
        let close = matching_paren(rest, 0)?;
        let alias = leading_alias(&rest[close + 1..]);
        return Ok(alias.map(|a| (a.clone(), Some(a))));
    }

    let bytes = rest.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        match bytes[end] {
            b'`' => end = skip_quoted(bytes, end)?,
            b if is_ident_byte(b) || b == b'.' => end += 1,
            _ => break,
        }
    }
    if end == 0 {
        return Err(DbError::parse(format!("Can't determine table in '{}'", tail.trim())));
    }

    let table = quoter.split_identifier(&rest[..end]);
    let name = match table.group {
        Some(group) => format!("{group}.{}", table.name),
        None => table.name,
    };
    Ok(Some((name, leading_alias(&rest[end..]))))
}

/// Parse an optional `[AS] alias` at the start of `s`.
fn leading_alias(s: &str) -> Option<String> {
    let mut s = s.trim_start();
    if let Some(len) = keyword_len_at(s, 0, "AS") {
        s = s[len..].trim_start();
    }
    if let Some(inner) = s.strip_prefix('`') {
        let end = inner.find('`')?;
        return Some(inner[..end].to_string());
    }
    let end = s.bytes().position(|b| !is_ident_byte(b)).unwrap_or(s.len());
    let word = &s[..end];
    if word.is_empty() || NOT_AN_ALIAS.iter().any(|kw| word.eq_ignore_ascii_case(kw)) {
        return None;
    }
    Some(word.to_string())
}

/// A placeholder found in statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder<'a> {
    /// The n-th `?` (0-based).
    Positional(usize),
    /// `:name`
    Named(&'a str),
}

/// Replace placeholders outside quoted text.
///
/// `replace` returns the replacement text, or `None` to leave the placeholder
/// as written.
pub(crate) fn substitute<'a, F>(sql: &'a str, mut replace: F) -> DbResult<String>
where
    F: FnMut(Placeholder<'a>) -> DbResult<Option<String>>,
{
    let bytes = sql.as_bytes();
    let mut found: Vec<(usize, usize, Placeholder<'a>)> = Vec::new();
    let mut positional = 0;

    scan(sql, |i, b, _| {
        match b {
            b'?' => {
                found.push((i, 1, Placeholder::Positional(positional)));
                positional += 1;
            }
            b':' => {
                let prev_colon = i > 0 && bytes[i - 1] == b':';
                let next = bytes.get(i + 1).copied();
                let starts_name = next.is_some_and(|c| c == b'_' || c.is_ascii_alphabetic());
                if !prev_colon && starts_name {
                    let end = bytes[i + 1..]
                        .iter()
                        .position(|&c| !(c == b'_' || c.is_ascii_alphanumeric()))
                        .map_or(bytes.len(), |p| i + 1 + p);
                    found.push((i, end - i, Placeholder::Named(&sql[i + 1..end])));
                }
            }
            _ => {}
        }
        true
    })?;

    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for (pos, len, placeholder) in found {
        if pos < last {
            continue;
        }
        if let Some(text) = replace(placeholder)? {
            out.push_str(&sql[last..pos]);
            out.push_str(&text);
            last = pos + len;
        }
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

/// Parse arguments into a statement: `?` gets the next positional argument,
/// `:name` the named one. Values are quoted with `quoter`.
pub fn bind(sql: &str, params: &Params, quoter: &dyn Quoter) -> DbResult<String> {
    match params {
        Params::None => Ok(sql.to_string()),
        Params::Positional(values) => substitute(sql, |p| match p {
            Placeholder::Positional(n) => values
                .get(n)
                .map(|v| Some(quoter.quote(v)))
                .ok_or_else(|| {
                    DbError::usage(format!(
                        "Missing value for placeholder #{}: {} value(s) given",
                        n + 1,
                        values.len()
                    ))
                }),
            Placeholder::Named(_) => Ok(None),
        }),
        Params::Named(values) => substitute(sql, |p| match p {
            Placeholder::Named(name) => values
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| Some(quoter.quote(v)))
                .ok_or_else(|| DbError::usage(format!("Missing value for placeholder ':{name}'"))),
            Placeholder::Positional(_) => Ok(None),
        }),
    }
}

/// Replace only `:name` placeholders with the given name, leaving all others.
pub(crate) fn bind_one(sql: &str, name: &str, value: &Value, quoter: &dyn Quoter) -> DbResult<String> {
    substitute(sql, |p| match p {
        Placeholder::Named(n) if n == name => Ok(Some(quoter.quote(value))),
        _ => Ok(None),
    })
}
