use super::statement::Statement;
use crate::error::DbResult;
use crate::quote::Quoter;

/// Base trait for SQL builders.
///
/// Builders hold resolved column names and values; rendering only needs the
/// dialect's [`Quoter`].
pub trait SqlBuilder {
    /// Build the SQL string.
    fn build_sql(&self, quoter: &dyn Quoter) -> DbResult<String>;

    /// Validate builder state.
    fn validate(&self) -> DbResult<()> {
        Ok(())
    }

    /// Validate and render into a [`Statement`].
    fn build(&self, quoter: &dyn Quoter) -> DbResult<Statement> {
        self.validate()?;
        Ok(Statement::new(self.build_sql(quoter)?))
    }
}
