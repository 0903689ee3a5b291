//! Statement preparation against live metadata.

use super::criteria::{Criteria, DeleteScope, FieldRef, StoreRows};
use super::delete::DeleteBuilder;
use super::select::SelectBuilder;
use super::statement::Statement;
use super::store::StoreBuilder;
use super::traits::SqlBuilder;
use super::update::UpdateBuilder;
use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::meta::TableMetadata;
use crate::value::Value;
use std::sync::Arc;

/// Resolves `#role` field references; metadata is only loaded when one is used.
struct FieldResolver {
    table: String,
    meta: Option<Arc<TableMetadata>>,
}

impl FieldResolver {
    fn resolve(&self, name: &str) -> DbResult<String> {
        match FieldRef::parse(name)? {
            FieldRef::Literal(name) => Ok(name),
            role => match &self.meta {
                Some(meta) => role.resolve(meta),
                None => Err(DbError::usage(format!(
                    "Unknown field '{name}' in table '{}'",
                    self.table
                ))),
            },
        }
    }
}

impl<D: Driver> Connection<D> {
    /// Wrap SQL text as a statement without touching it.
    pub fn prepare(&self, sql: impl Into<String>) -> Statement {
        Statement::new(sql)
    }

    /// Table name without alias, for metadata lookups.
    pub(crate) fn base_name(&self, table: &str) -> String {
        let ident = self.quoter().split_identifier(table);
        match ident.group {
            Some(group) => format!("{group}.{}", ident.name),
            None => ident.name,
        }
    }

    async fn field_resolver<'a, I>(&self, table: &str, names: I) -> DbResult<FieldResolver>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let base = self.base_name(table);
        let meta = if names.into_iter().any(FieldRef::is_role_ref) {
            Some(self.fetch_metadata(&base).await?)
        } else {
            None
        };
        Ok(FieldResolver { table: base, meta })
    }

    /// Match key values positionally to the primary key of `table`.
    async fn key_conditions(
        &self,
        action: &str,
        table: &str,
        values: Vec<Value>,
    ) -> DbResult<Vec<(String, Value)>> {
        let keys = self.get_primary_key(table, false, false).await?;
        if keys.is_empty() {
            return Err(DbError::usage(format!(
                "Unable to {action} record for {table}: Unable to determine a WHERE statement. The table might have no primary key."
            )));
        }
        if keys.len() != values.len() {
            return Err(DbError::usage(format!(
                "Unable to {action} record for {table}: {} values specified, while primary key from table consists of {} keys ({})",
                values.len(),
                keys.len(),
                keys.join(", ")
            )));
        }
        Ok(keys.into_iter().zip(values).collect())
    }

    /// Turn criteria into `column = value` conditions.
    async fn criteria_conditions(
        &self,
        action: &str,
        table: &str,
        criteria: Criteria,
    ) -> DbResult<Vec<(String, Value)>> {
        match criteria {
            Criteria::None => Ok(Vec::new()),
            Criteria::Key(values) => {
                self.key_conditions(action, &self.base_name(table), values)
                    .await
            }
            Criteria::Fields(pairs) => {
                let resolver = self
                    .field_resolver(table, pairs.iter().map(|(k, _)| k.as_str()))
                    .await?;
                pairs
                    .into_iter()
                    .map(|(k, v)| Ok::<_, DbError>((resolver.resolve(&k)?, v)))
                    .collect()
            }
        }
    }

    /// `SELECT fields FROM table WHERE criteria [AND where]`.
    ///
    /// An empty field list selects `*`. Key criteria must supply one value
    /// per primary key column.
    pub async fn prepare_select(
        &self,
        table: &str,
        fields: &[&str],
        criteria: impl Into<Criteria>,
        where_clause: Option<&str>,
    ) -> DbResult<Statement> {
        let conditions = self
            .criteria_conditions("select", table, criteria.into())
            .await?;
        let resolver = self.field_resolver(table, fields.iter().copied()).await?;

        let mut builder = SelectBuilder::new(table);
        for field in fields {
            builder.field(resolver.resolve(field)?);
        }
        for (column, value) in conditions {
            builder.and_eq(column, value);
        }
        if let Some(condition) = where_clause {
            builder.and_where(condition);
        }
        builder.build(self.quoter())
    }

    /// Insert rows, updating existing rows with the same key.
    pub async fn prepare_store(&self, table: &str, rows: StoreRows) -> DbResult<Statement> {
        if rows.is_empty() {
            return Err(DbError::NoRows);
        }
        let base = self.base_name(table);

        let (fields, rows) = match rows {
            StoreRows::Record(pairs) => {
                let resolver = self
                    .field_resolver(table, pairs.iter().map(|(k, _)| k.as_str()))
                    .await?;
                let mut fields = Vec::with_capacity(pairs.len());
                let mut values = Vec::with_capacity(pairs.len());
                for (field, value) in pairs {
                    fields.push(resolver.resolve(&field)?);
                    values.push(value);
                }
                (fields, vec![values])
            }
            StoreRows::Rows {
                fields: Some(fields),
                rows,
            } => {
                let resolver = self
                    .field_resolver(table, fields.iter().map(String::as_str))
                    .await?;
                let fields = fields
                    .iter()
                    .map(|f| resolver.resolve(f))
                    .collect::<DbResult<Vec<_>>>()?;
                (fields, rows)
            }
            StoreRows::Rows { fields: None, rows } => (self.get_field_names(&base).await?, rows),
        };

        let primary_key = self.get_primary_key(&base, false, false).await?;
        let auto_increment = self.get_primary_key(&base, true, false).await?;

        let mut builder = StoreBuilder::new(&base, fields);
        builder.rows(rows).primary_key(primary_key);
        if let Some(id) = auto_increment.into_iter().next() {
            builder.auto_increment(id);
        }
        builder.build(self.quoter())
    }

    /// `UPDATE table SET values WHERE id`.
    pub async fn prepare_update<I, K, T>(
        &self,
        table: &str,
        id: impl Into<Criteria>,
        values: I,
    ) -> DbResult<Statement>
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        let values: Vec<(String, Value)> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let conditions = self
            .criteria_conditions("update", table, id.into())
            .await?;
        let resolver = self
            .field_resolver(table, values.iter().map(|(k, _)| k.as_str()))
            .await?;

        let mut builder = UpdateBuilder::new(self.base_name(table));
        for (field, value) in values {
            let column = resolver.resolve(&field).map_err(|_| {
                DbError::usage(format!(
                    "Unable to update table `{}`: Unknown field '{field}'",
                    resolver.table
                ))
            })?;
            builder.set(column, value);
        }
        for (column, value) in conditions {
            builder.and_eq(column, value);
        }
        builder.build(self.quoter())
    }

    /// `DELETE FROM table WHERE id`, or `TRUNCATE table`.
    pub async fn prepare_delete(
        &self,
        table: &str,
        scope: impl Into<DeleteScope>,
    ) -> DbResult<Statement> {
        let base = self.base_name(table);
        let criteria = match scope.into() {
            DeleteScope::Truncate => return DeleteBuilder::truncate(base).build(self.quoter()),
            DeleteScope::Matching(criteria) => criteria,
        };

        let conditions = self.criteria_conditions("delete", table, criteria).await?;
        let mut builder = DeleteBuilder::new(base);
        for (column, value) in conditions {
            builder.and_eq(column, value);
        }
        builder.build(self.quoter())
    }
}
