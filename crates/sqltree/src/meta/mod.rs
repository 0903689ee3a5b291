//! Schema introspection.
//!
//! Table and column facts come from `SHOW TABLE STATUS`, `SHOW FIELDS` and the
//! `INFORMATION_SCHEMA` foreign-key catalog. Roles (`id`, `parentkey`,
//! `description`, `active`, junction tables) are inferred from those facts.
//! Results are cached per connection until [`Connection::clear_metadata_cache`].

mod cache;
mod introspect;
mod types;

#[cfg(test)]
mod tests;

pub(crate) use cache::KeyedCache;
pub use introspect::{ACTIVE_ALIAS, TypeInfo, normalize_type, set_implicit_properties};
pub use types::{FieldMetadata, FieldRole, FieldType, TableMetadata, TableRole};

use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::monitor::QueryContext;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn metadata_query(sql: String) -> QueryContext {
    QueryContext::new(&sql).with_tag("metadata")
}

impl<D: Driver> Connection<D> {
    /// Name of the current database.
    pub async fn get_db_name(&self) -> DbResult<Option<String>> {
        let cursor = self.fetch_rows(metadata_query("SELECT DATABASE()".into())).await?;
        Ok(cursor
            .rows
            .first()
            .and_then(|row| row.first())
            .filter(|v| !v.is_null())
            .map(Value::to_string))
    }

    /// Names of all tables in the current database.
    pub async fn get_table_names(&self) -> DbResult<Vec<String>> {
        let cursor = self.fetch_rows(metadata_query("SHOW TABLES".into())).await?;
        Ok(cursor
            .rows
            .iter()
            .filter_map(|row| row.first())
            .map(Value::to_string)
            .collect())
    }

    /// Column names of `table`, in table order.
    pub async fn get_field_names(&self, table: &str) -> DbResult<Vec<String>> {
        let sql = introspect::show_fields_sql(self.quoter(), table)?;
        let cursor = self.fetch_rows(metadata_query(sql)).await?;
        Ok(cursor
            .rows
            .iter()
            .filter_map(|row| introspect::cell_text(&cursor, row, "Field"))
            .collect())
    }

    /// Raw `SHOW TABLE STATUS` facts with lowercased keys; `None` if the table doesn't exist.
    pub async fn get_table_info(&self, table: &str) -> DbResult<Option<BTreeMap<String, Value>>> {
        let sql = introspect::table_status_sql(self.quoter(), table);
        let cursor = self.fetch_rows(metadata_query(sql)).await?;
        Ok(cursor.rows.first().map(|row| {
            cursor
                .columns
                .iter()
                .zip(row)
                .map(|(c, v)| (c.name.to_ascii_lowercase(), v.clone()))
                .collect()
        }))
    }

    /// Primary key column(s) of `table`; empty when the table has none.
    ///
    /// Memoized per `(table, auto_increment_only)`. `as_identifier` only
    /// changes the formatting (`` `table`.`field` ``) of the cached names.
    pub async fn get_primary_key(
        &self,
        table: &str,
        auto_increment_only: bool,
        as_identifier: bool,
    ) -> DbResult<Vec<String>> {
        let base = self.base_name(table);
        let table = base.as_str();
        let key = (base.clone(), auto_increment_only);
        let fields = self
            .primary_keys
            .get_or_try_init(&key, || async {
                let sql = introspect::primary_key_sql(self.quoter(), table, auto_increment_only)?;
                let cursor = self.fetch_rows(metadata_query(sql)).await?;
                Ok::<_, DbError>(
                    cursor
                        .rows
                        .iter()
                        .filter_map(|row| {
                            introspect::cell_text(&cursor, row, "Field")
                                .or_else(|| row.first().map(Value::to_string))
                        })
                        .collect(),
                )
            })
            .await?;

        if !as_identifier {
            return Ok(fields);
        }
        Ok(fields
            .iter()
            .map(|f| self.quoter().make_identifier(Some(table), Some(f), None))
            .collect())
    }

    /// Table and column metadata, with roles inferred. Memoized per table;
    /// `` `t` `` and `t` share one entry.
    pub async fn fetch_metadata(&self, table: &str) -> DbResult<Arc<TableMetadata>> {
        let base = self.base_name(table);
        let table = base.as_str();
        self.metadata
            .get_or_try_init(&base, || async {
                self.load_metadata(table).await.map(Arc::new)
            })
            .await
    }

    async fn load_metadata(&self, table: &str) -> DbResult<TableMetadata> {
        let quoter = self.quoter();
        let mut meta = TableMetadata::new(table);

        let status = self
            .fetch_rows(metadata_query(introspect::table_status_sql(quoter, table)))
            .await?;
        if !introspect::apply_table_status(&mut meta, &status) {
            return Err(DbError::usage(format!("Table '{table}' doesn't exist")));
        }

        let fields = self
            .fetch_rows(metadata_query(introspect::show_fields_sql(quoter, table)?))
            .await?;
        meta.fields = introspect::parse_fields(table, &fields);

        if self.config().foreign_keys {
            let keys = self
                .fetch_rows(metadata_query(introspect::foreign_keys_sql(quoter, table)))
                .await?;
            introspect::apply_foreign_keys(&mut meta, &keys);
        }

        self.set_implicit_properties(&mut meta);
        tracing::debug!(
            target: "sqltree.meta",
            table,
            fields = meta.fields.len(),
            role = ?meta.role,
            "fetched table metadata"
        );
        Ok(meta)
    }

    /// Infer roles and display templates using this connection's conventions.
    pub fn set_implicit_properties(&self, meta: &mut TableMetadata) {
        let declared = self.config().junction_tables.contains(&meta.table);
        set_implicit_properties(
            meta,
            &self.config().role_conventions,
            declared,
            self.quoter(),
        );
    }

    /// Drop cached metadata and primary keys for one table, or for all tables.
    pub fn clear_metadata_cache(&self, table: Option<&str>) {
        match table {
            Some(table) => {
                let table = self.base_name(table);
                self.metadata.remove(&table);
                self.primary_keys.retain(|(t, _)| *t != table);
            }
            None => {
                self.metadata.clear();
                self.primary_keys.clear();
            }
        }
    }
}
