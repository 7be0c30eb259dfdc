//! The helper handed to migration modules.

use std::sync::Arc;

use crate::driver::{Driver, ExecResult};
use crate::error::WeaveResult;
use crate::schema::{ColumnDef, TableSchema, ddl};
use crate::value::Value;

/// A thin wrapper around the driver exposing raw SQL plus the DDL
/// operations migrations need. Rendering is shared with
/// [`Database::create_tables`](crate::Database::create_tables).
pub struct SchemaEditor {
    driver: Arc<dyn Driver>,
}

impl SchemaEditor {
    pub(crate) fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Execute raw SQL with positional `$N` parameters.
    pub async fn sql(&self, raw: &str, params: &[Value]) -> WeaveResult<ExecResult> {
        self.driver.exec(raw, params).await
    }

    pub async fn create_table(&self, name: &str, schema: &TableSchema) -> WeaveResult<()> {
        let sql = ddl::create_table(name, schema)?;
        self.driver.exec(&sql, &[]).await?;
        Ok(())
    }

    pub async fn drop_table(&self, name: &str) -> WeaveResult<()> {
        self.driver.exec(&ddl::drop_table(name), &[]).await?;
        Ok(())
    }

    pub async fn add_column(&self, table: &str, column: &str, def: &ColumnDef) -> WeaveResult<()> {
        let sql = ddl::add_column(table, column, def)?;
        self.driver.exec(&sql, &[]).await?;
        Ok(())
    }

    pub async fn drop_column(&self, table: &str, column: &str) -> WeaveResult<()> {
        self.driver
            .exec(&ddl::drop_column(table, column), &[])
            .await?;
        Ok(())
    }

    pub async fn rename_table(&self, old: &str, new: &str) -> WeaveResult<()> {
        self.driver.exec(&ddl::rename_table(old, new), &[]).await?;
        Ok(())
    }

    pub async fn rename_column(&self, table: &str, old: &str, new: &str) -> WeaveResult<()> {
        self.driver
            .exec(&ddl::rename_column(table, old, new), &[])
            .await?;
        Ok(())
    }
}
