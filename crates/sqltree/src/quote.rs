//! Identifier and value quoting.
//!
//! [`Quoter`] is the dialect seam: it escapes values and identifiers for safe
//! embedding into SQL text, and splits/recomposes `group.name AS alias`
//! identifiers. [`MySqlQuoter`] implements the backtick dialect.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `` ` `` as ``` `` ```
//!
//! # Example
//! ```
//! use sqltree::quote::{MySqlQuoter, Quoter};
//!
//! let q = MySqlQuoter;
//! assert_eq!(q.quote_identifier("shop.orders AS o").unwrap(), "`shop`.`orders` AS `o`");
//! assert_eq!(q.quote(&"it's".into()), "'it\\'s'");
//! ```

use crate::error::{DbError, DbResult};
use crate::value::Value;

/// A split identifier: `group.name AS alias`.
///
/// For a column `group` is the table; for a table it is the database.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identifier {
    pub group: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

/// Dialect-specific quoting rules.
pub trait Quoter: Send + Sync {
    /// Quote a value so it can be safely embedded in a statement.
    fn quote(&self, value: &Value) -> String;

    /// Quote a (possibly dotted and aliased) identifier.
    ///
    /// Fails if `name` is not a valid identifier.
    fn quote_identifier(&self, name: &str) -> DbResult<String>;

    /// Split `group.name AS alias` into its parts, unquoting each of them.
    fn split_identifier(&self, name: &str) -> Identifier;

    /// Build a quoted identifier from its parts.
    fn make_identifier(&self, group: Option<&str>, name: Option<&str>, alias: Option<&str>)
    -> String;

    /// Check if a string is an identifier (as opposed to an expression).
    ///
    /// `with_group`: `Some(true)` requires `group.name`, `Some(false)` forbids a
    /// group, `None` allows both.
    fn valid_identifier(&self, name: &str, with_group: Option<bool>, with_alias: bool) -> bool;
}

/// MySQL quoting: backtick identifiers, backslash-escaped string literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlQuoter;

/// A part of a dotted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentPart {
    Unquoted(String),
    Quoted(String),
    Star,
}

impl IdentPart {
    fn name(&self) -> &str {
        match self {
            Self::Unquoted(s) | Self::Quoted(s) => s,
            Self::Star => "*",
        }
    }
}

struct ParsedIdent {
    parts: Vec<IdentPart>,
    alias: Option<IdentPart>,
}

/// Parse `a.b.c [AS] alias` with backtick-quoted parts.
fn parse_ident(s: &str) -> DbResult<ParsedIdent> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DbError::usage("Identifier cannot be empty"));
    }
    if s.contains('\0') {
        return Err(DbError::usage("Identifier cannot contain NUL character"));
    }

    let mut chars = s.chars().peekable();
    let mut parts = Vec::new();

    loop {
        let part = parse_part(&mut chars, true)?;
        let is_star = part == IdentPart::Star;
        parts.push(part);

        match chars.peek() {
            Some('.') if !is_star => {
                chars.next();
                if chars.peek().is_none() {
                    return Err(DbError::usage("Trailing '.' in identifier"));
                }
            }
            _ => break,
        }
    }

    let rest: String = chars.collect();
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(ParsedIdent { parts, alias: None });
    }
    if parts.last() == Some(&IdentPart::Star) {
        return Err(DbError::usage("A wildcard can't have an alias"));
    }

    let alias_src = match rest.get(..3) {
        Some(kw) if kw.eq_ignore_ascii_case("as ") => rest[3..].trim_start(),
        _ => rest,
    };
    let mut alias_chars = alias_src.chars().peekable();
    let alias = parse_part(&mut alias_chars, false)?;
    if alias_chars.next().is_some() {
        return Err(DbError::usage(format!("Unexpected text after alias in '{s}'")));
    }

    Ok(ParsedIdent {
        parts,
        alias: Some(alias),
    })
}

fn parse_part(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    allow_star: bool,
) -> DbResult<IdentPart> {
    match chars.peek() {
        Some('`') => {
            chars.next();
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('`') => {
                        // Escaped backtick: ``
                        if chars.peek() == Some(&'`') {
                            chars.next();
                            name.push('`');
                        } else {
                            break;
                        }
                    }
                    Some(c) => name.push(c),
                    None => return Err(DbError::usage("Unclosed quoted identifier")),
                }
            }
            if name.is_empty() {
                return Err(DbError::usage("Empty quoted identifier"));
            }
            Ok(IdentPart::Quoted(name))
        }
        Some('*') if allow_star => {
            chars.next();
            Ok(IdentPart::Star)
        }
        _ => {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    break;
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(DbError::usage("Empty identifier segment"));
            }
            Ok(IdentPart::Unquoted(name))
        }
    }
}

fn push_quoted(out: &mut String, name: &str) {
    if name == "*" {
        out.push('*');
        return;
    }
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push_str("``");
        } else {
            out.push(ch);
        }
    }
    out.push('`');
}

fn escape_string(out: &mut String, s: &str) {
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

impl Quoter for MySqlQuoter {
    fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) if v.is_finite() => v.to_string(),
            Value::Float(_) => "NULL".to_string(),
            Value::Text(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                escape_string(&mut out, s);
                out
            }
            Value::Bytes(b) => {
                if b.is_empty() {
                    return "''".to_string();
                }
                let mut out = String::with_capacity(b.len() * 2 + 3);
                out.push_str("X'");
                for byte in b {
                    out.push_str(&format!("{byte:02X}"));
                }
                out.push('\'');
                out
            }
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
                let mut out = String::new();
                escape_string(&mut out, &value.to_string());
                out
            }
            Value::List(items) => {
                if items.is_empty() {
                    return "NULL".to_string();
                }
                items
                    .iter()
                    .map(|v| self.quote(v))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
    }

    fn quote_identifier(&self, name: &str) -> DbResult<String> {
        let parsed = parse_ident(name)?;
        let mut out = String::with_capacity(name.len() + 4);
        for (i, part) in parsed.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            push_quoted(&mut out, part.name());
        }
        if let Some(alias) = parsed.alias {
            out.push_str(" AS ");
            push_quoted(&mut out, alias.name());
        }
        Ok(out)
    }

    fn split_identifier(&self, name: &str) -> Identifier {
        let Ok(parsed) = parse_ident(name) else {
            return Identifier {
                group: None,
                name: name.trim().to_string(),
                alias: None,
            };
        };

        let mut names: Vec<&str> = parsed.parts.iter().map(IdentPart::name).collect();
        let last = names.pop().unwrap_or_default().to_string();
        Identifier {
            group: (!names.is_empty()).then(|| names.join(".")),
            name: last,
            alias: parsed.alias.map(|a| a.name().to_string()),
        }
    }

    fn make_identifier(
        &self,
        group: Option<&str>,
        name: Option<&str>,
        alias: Option<&str>,
    ) -> String {
        let mut out = String::new();
        if let Some(name) = name {
            if let Some(group) = group.filter(|g| !g.is_empty()) {
                // A group may itself be dotted (`db.table`).
                let group_parts = parse_ident(group)
                    .map(|p| p.parts.iter().map(|x| x.name().to_string()).collect())
                    .unwrap_or_else(|_| vec![group.to_string()]);
                for part in group_parts {
                    push_quoted(&mut out, &part);
                    out.push('.');
                }
            }
            push_quoted(&mut out, name);
        }
        if let Some(alias) = alias {
            out.push_str(" AS ");
            push_quoted(&mut out, alias);
        }
        out
    }

    fn valid_identifier(&self, name: &str, with_group: Option<bool>, with_alias: bool) -> bool {
        let Ok(parsed) = parse_ident(name) else {
            return false;
        };
        if parsed.alias.is_some() && !with_alias {
            return false;
        }
        let has_group = parsed.parts.len() > 1;
        match with_group {
            Some(true) => has_group,
            Some(false) => !has_group,
            None => true,
        }
    }
}
