//! Metadata statements and role inference.
//!
//! Everything here is pure: statement text goes out through
//! [`Connection`](crate::Connection), cursors come back in and are folded
//! into [`TableMetadata`].

use super::types::{FieldMetadata, FieldRole, FieldType, TableMetadata, TableRole};
use crate::config::RoleConventions;
use crate::driver::RowCursor;
use crate::error::DbResult;
use crate::quote::Quoter;
use crate::value::Value;
use regex::Regex;
use std::sync::OnceLock;

/// Alias given to the active flag in `descview`.
pub const ACTIVE_ALIAS: &str = "role:active";

/// Type information parsed from a native column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub field_type: FieldType,
    pub maxlength: Option<u32>,
    pub decimals: Option<u32>,
    pub values: Vec<String>,
}

fn size_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:tiny|medium|big|long(?:long)?)(\w)")
            .expect("invalid built-in size prefix regex")
    })
}

fn type_args_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^(]*?)\s*\((.+)\)").expect("invalid built-in type argument regex")
    })
}

fn precision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s*,\s*(\d+)\s*$").expect("invalid built-in precision regex")
    })
}

/// Parse a quoted member list: `'a','b''c'` -> `["a", "b'c"]`.
fn parse_members(args: &str) -> Vec<String> {
    let mut members = Vec::new();
    let mut chars = args.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut member = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    member.push('\'');
                }
                '\'' => break,
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        member.push(escaped);
                    }
                }
                c => member.push(c),
            }
        }
        members.push(member);
    }
    members
}

/// Normalize a native MySQL column type.
///
/// ```
/// use sqltree::meta::{normalize_type, FieldType};
///
/// let info = normalize_type("decimal(10,2)");
/// assert_eq!(info.field_type, FieldType::Decimal);
/// assert_eq!((info.maxlength, info.decimals), (Some(11), Some(2)));
/// assert_eq!(normalize_type("tinyint(1)").field_type, FieldType::Boolean);
/// ```
pub fn normalize_type(native: &str) -> TypeInfo {
    let native = native.trim();
    if native.eq_ignore_ascii_case("tinyint(1)") {
        return TypeInfo {
            field_type: FieldType::Boolean,
            maxlength: None,
            decimals: None,
            values: Vec::new(),
        };
    }

    let stripped = size_prefix_re().replace(native, "$1");
    let mut info = TypeInfo {
        field_type: FieldType::Unknown,
        maxlength: None,
        decimals: None,
        values: Vec::new(),
    };

    let base = match type_args_re().captures(&stripped) {
        Some(caps) => {
            let args = caps.get(2).map_or("", |m| m.as_str());
            if args.contains('\'') {
                info.values = parse_members(args);
            } else if let Some(p) = precision_re().captures(args) {
                let len: u32 = p[1].parse().unwrap_or(0);
                let decimals: u32 = p[2].parse().unwrap_or(0);
                // Room for the decimal point.
                info.maxlength = Some(if decimals > 0 { len + 1 } else { len });
                info.decimals = Some(decimals);
            } else if let Ok(len) = args.trim().parse::<u32>() {
                info.maxlength = Some(len);
            }
            caps.get(1).map_or("", |m| m.as_str()).to_string()
        }
        None => stripped.split_whitespace().next().unwrap_or("").to_string(),
    };

    info.field_type = FieldType::from_name(&base);
    info
}

pub(crate) fn show_fields_sql(quoter: &dyn Quoter, table: &str) -> DbResult<String> {
    Ok(format!("SHOW FIELDS FROM {}", quoter.quote_identifier(table)?))
}

pub(crate) fn primary_key_sql(
    quoter: &dyn Quoter,
    table: &str,
    auto_increment_only: bool,
) -> DbResult<String> {
    let mut sql = format!(
        "{} WHERE `Key` = 'PRI'",
        show_fields_sql(quoter, table)?
    );
    if auto_increment_only {
        sql.push_str(" AND `Extra` = 'auto_increment'");
    }
    Ok(sql)
}

pub(crate) fn table_status_sql(quoter: &dyn Quoter, table: &str) -> String {
    let id = quoter.split_identifier(table);
    match id.group {
        Some(db) => format!(
            "SHOW TABLE STATUS FROM {} LIKE {}",
            quoter.make_identifier(None, Some(&db), None),
            quoter.quote(&Value::from(id.name))
        ),
        None => format!("SHOW TABLE STATUS LIKE {}", quoter.quote(&Value::from(id.name))),
    }
}

pub(crate) fn foreign_keys_sql(quoter: &dyn Quoter, table: &str) -> String {
    let id = quoter.split_identifier(table);
    let schema = match id.group {
        Some(db) => quoter.quote(&Value::from(db)),
        None => "DATABASE()".to_string(),
    };
    format!(
        "SELECT `COLUMN_NAME`, IF(`REFERENCED_TABLE_SCHEMA` = DATABASE(), `REFERENCED_TABLE_NAME`, \
         CONCAT(`REFERENCED_TABLE_SCHEMA`, '.', `REFERENCED_TABLE_NAME`)), `REFERENCED_COLUMN_NAME` \
         FROM `INFORMATION_SCHEMA`.`KEY_COLUMN_USAGE` WHERE `TABLE_SCHEMA` = {schema} \
         AND `TABLE_NAME` = {} AND `REFERENCED_COLUMN_NAME` IS NOT NULL",
        quoter.quote(&Value::from(id.name))
    )
}

/// Text of a cell looked up by case-insensitive column name.
pub(crate) fn cell_text(cursor: &RowCursor, row: &[Value], column: &str) -> Option<String> {
    let index = cursor
        .columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(column))?;
    match row.get(index)? {
        Value::Null => None,
        v => Some(v.to_string()),
    }
}

/// Fold a `SHOW TABLE STATUS` cursor into table facts. `false` when the table doesn't exist.
pub(crate) fn apply_table_status(meta: &mut TableMetadata, cursor: &RowCursor) -> bool {
    let Some(row) = cursor.rows.first() else {
        return false;
    };
    meta.engine = cell_text(cursor, row, "Engine");
    meta.row_format = cell_text(cursor, row, "Row_format");
    meta.collation = cell_text(cursor, row, "Collation");
    meta.max_data_length = cell_text(cursor, row, "Max_data_length").and_then(|v| v.parse().ok());
    meta.create_time = cell_text(cursor, row, "Create_time");
    true
}

/// Build column metadata from a `SHOW FIELDS` cursor.
///
/// Assigns the `id` role to the auto-increment primary key column, or to the
/// primary key column when the key is a single non-auto-increment column.
pub(crate) fn parse_fields(table: &str, cursor: &RowCursor) -> Vec<FieldMetadata> {
    let mut fields = Vec::with_capacity(cursor.rows.len());
    let mut primaries = Vec::new();
    let mut has_id = false;

    for row in &cursor.rows {
        let Some(name) = cell_text(cursor, row, "Field") else {
            continue;
        };
        let mut field = FieldMetadata::new(table, name);
        let extra = cell_text(cursor, row, "Extra").unwrap_or_default();

        field.native_type = cell_text(cursor, row, "Type").unwrap_or_default();
        field.nullable = cell_text(cursor, row, "Null").is_some_and(|v| v.eq_ignore_ascii_case("YES"));
        field.auto_increment = extra.to_ascii_lowercase().contains("auto_increment");
        field.required = !field.nullable && !field.auto_increment;
        field.default = cell_text(cursor, row, "Default");

        if cell_text(cursor, row, "Key").is_some_and(|k| k.eq_ignore_ascii_case("PRI")) {
            field.is_primary = true;
            if field.auto_increment && !has_id {
                field.roles.insert(FieldRole::Id);
                has_id = true;
            } else {
                primaries.push(fields.len());
            }
        }

        let info = normalize_type(&field.native_type);
        field.field_type = info.field_type;
        field.maxlength = info.maxlength;
        field.decimals = info.decimals;
        field.values = info.values;

        fields.push(field);
    }

    if let [single] = primaries.as_slice() {
        if !has_id {
            fields[*single].roles.insert(FieldRole::Id);
        }
    }
    fields
}

/// Annotate columns from the foreign-key catalog query.
pub(crate) fn apply_foreign_keys(meta: &mut TableMetadata, cursor: &RowCursor) {
    for row in &cursor.rows {
        let column = row.first().filter(|v| !v.is_null()).map(Value::to_string);
        let Some(field) = column.and_then(|c| meta.field_mut(&c)) else {
            continue;
        };
        field.foreign_table = row.get(1).filter(|v| !v.is_null()).map(Value::to_string);
        field.foreign_column = row.get(2).filter(|v| !v.is_null()).map(Value::to_string);
    }
}

fn assign_convention_role<F>(meta: &mut TableMetadata, role: FieldRole, accepts: F)
where
    F: Fn(&FieldMetadata) -> bool,
{
    if meta.field_by_role(role).is_some() {
        return;
    }
    if let Some(field) = meta.fields.iter_mut().find(|f| accepts(f)) {
        field.roles.insert(role);
    }
}

/// Infer roles and display templates that follow from the column facts.
///
/// A table becomes a junction table when it has no `id` column, a composite
/// primary key and a primary key column referencing another table. A table
/// claimed to be a junction (declared, or already marked) without a
/// resolvable parent is downgraded to a plain table with a warning.
pub fn set_implicit_properties(
    meta: &mut TableMetadata,
    conventions: &RoleConventions,
    declared_junction: bool,
    quoter: &dyn Quoter,
) {
    assign_convention_role(meta, FieldRole::Description, |f| {
        matches!(f.field_type, FieldType::String | FieldType::Enum)
            && conventions.is_description(&f.name)
    });
    assign_convention_role(meta, FieldRole::Active, |f| {
        matches!(f.field_type, FieldType::Boolean | FieldType::Integer | FieldType::Bit)
            && conventions.is_active(&f.name)
    });

    resolve_junction(meta, declared_junction);

    if meta.view.is_empty() {
        meta.view = "*".to_string();
    }

    let table = meta.table.clone();
    let id = meta.field_by_role(FieldRole::Id).map(|f| f.name.clone());
    let description = meta
        .field_by_role(FieldRole::Description)
        .map(|f| f.name.clone());
    if let (Some(id), Some(description)) = (id, description) {
        let overview = format!(
            "{}, {}",
            quoter.make_identifier(Some(&table), Some(&id), None),
            quoter.make_identifier(Some(&table), Some(&description), None)
        );
        let active = match meta.field_by_role(FieldRole::Active) {
            Some(f) => quoter.make_identifier(Some(&table), Some(&f.name), Some(ACTIVE_ALIAS)),
            None => format!(
                "{}{}",
                quoter.quote(&Value::Int(1)),
                quoter.make_identifier(None, None, Some(ACTIVE_ALIAS))
            ),
        };
        if meta.descview.is_none() {
            meta.descview = Some(format!("{overview}, {active}"));
        }
        if meta.overview.is_none() {
            meta.overview = Some(overview);
        }
    }
}

fn resolve_junction(meta: &mut TableMetadata, declared: bool) {
    if meta.is_junction() && meta.parent.is_some() {
        return;
    }

    let claimed = declared || meta.is_junction();
    let has_id = meta.field_by_role(FieldRole::Id).is_some();
    let primary_count = meta.fields.iter().filter(|f| f.is_primary).count();
    if !claimed && (has_id || primary_count < 2) {
        return;
    }

    let resolvable = meta.fields.iter().position(|f| {
        (f.is_primary || f.has_role(FieldRole::ParentKey))
            && f.foreign_table.as_deref().is_some_and(|t| !t.is_empty())
    });
    if let Some(index) = resolvable {
        let field = &mut meta.fields[index];
        field.roles.insert(FieldRole::ParentKey);
        meta.parent = field.foreign_table.clone();
        meta.role = TableRole::Junction;
        return;
    }

    let unresolved = meta
        .fields
        .iter()
        .find(|f| (f.is_primary && f.has_foreign_key()) || f.has_role(FieldRole::ParentKey));
    if !claimed && unresolved.is_none() {
        return;
    }

    let reason = match unresolved {
        Some(f) => format!("parentkey field '{}' doesn't have a foreign table", f.name),
        None => "table doesn't have a parentkey field".to_string(),
    };
    let warning = format!(
        "Table '{}' can't be a junction table, since the parent of the table is unknown and {reason}",
        meta.table
    );
    tracing::warn!(target: "sqltree.meta", table = %meta.table, "{warning}");
    meta.warnings.push(warning);
    meta.role = TableRole::None;
    meta.parent = None;
}
