//! The database handle.
//!
//! A [`Database`] bundles the immutable schema, the driver, and the
//! optional overlays (logger, soft-delete). It is cheap to clone and may be
//! shared read-only across tasks; the builders it hands out are
//! single-caller values.

use std::future::Future;
use std::sync::Arc;

use crate::driver::{Driver, ExecResult, LoggingDriver};
use crate::error::{WeaveError, WeaveResult};
use crate::logger::QueryLogger;
use crate::qb::QueryBuilder;
use crate::schema::{DatabaseSchema, ddl};
use crate::soft_delete::SoftDeleteConfig;
use crate::value::Value;

/// Handle to a configured database: schema + driver + overlays.
#[derive(Clone)]
pub struct Database {
    schema: Arc<DatabaseSchema>,
    driver: Arc<dyn Driver>,
    soft_delete: Option<Arc<SoftDeleteConfig>>,
}

impl Database {
    /// Create a handle. The schema is validated here, once, and stays
    /// immutable for the life of the handle.
    pub fn new(schema: DatabaseSchema, driver: Arc<dyn Driver>) -> WeaveResult<Self> {
        schema.validate()?;
        Ok(Self {
            schema: Arc::new(schema),
            driver,
            soft_delete: None,
        })
    }

    /// Wrap the driver so every statement is reported to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.driver = Arc::new(LoggingDriver::new(self.driver, logger));
        self
    }

    /// Enable the soft-delete overlay for the configured tables.
    pub fn with_soft_delete(mut self, config: SoftDeleteConfig) -> Self {
        self.soft_delete = Some(Arc::new(config));
        self
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }

    /// Start a query against a table.
    pub fn query(&self, table: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(table, self.driver.clone(), self.soft_delete.clone())
    }

    /// Start a query whose FROM source is a rendered subquery.
    pub fn query_from(&self, inner: QueryBuilder, alias: impl Into<String>) -> QueryBuilder {
        QueryBuilder::from_subquery(inner, alias, self.driver.clone(), self.soft_delete.clone())
    }

    /// Execute raw SQL with positional `$N` parameters.
    pub async fn raw(&self, sql: &str, params: &[Value]) -> WeaveResult<ExecResult> {
        self.driver.exec(sql, params).await
    }

    /// Emit `CREATE TABLE IF NOT EXISTS` for every table in the schema, in
    /// declaration order.
    pub async fn create_tables(&self) -> WeaveResult<()> {
        for (name, table) in self.schema.iter() {
            let sql = ddl::create_table(name, table)?;
            self.driver.exec(&sql, &[]).await?;
        }
        Ok(())
    }

    /// Run `f` inside a transaction.
    ///
    /// The callback receives a handle sharing this one's schema and
    /// overlays but bound to the transaction driver. Commits when the
    /// callback returns `Ok`, rolls back and propagates on `Err`;
    /// cancellation before the commit leaves the rollback to the driver's
    /// connection teardown. Nested calls reuse the already-open
    /// transaction.
    pub async fn transaction<T, F, Fut>(&self, f: F) -> WeaveResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = WeaveResult<T>>,
    {
        if self.driver.in_transaction() {
            return f(self.clone()).await;
        }

        let tx = self.driver.begin().await?;
        let bound = Database {
            schema: self.schema.clone(),
            driver: tx.clone(),
            soft_delete: self.soft_delete.clone(),
        };

        match f(bound).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(error) => match tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err(WeaveError::driver(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }

    /// Close the underlying driver.
    pub async fn close(&self) -> WeaveResult<()> {
        self.driver.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingDriver;
    use crate::record;
    use crate::schema::{ColumnDef, ColumnType, TableSchema};

    fn schema() -> DatabaseSchema {
        DatabaseSchema::new().table(
            "users",
            TableSchema::new()
                .column("id", ColumnDef::new(ColumnType::Int).primary_key())
                .column("name", ColumnDef::new(ColumnType::Text)),
        )
    }

    fn handle() -> (Database, RecordingDriver) {
        let driver = RecordingDriver::new();
        let db = Database::new(schema(), Arc::new(driver.clone())).unwrap();
        (db, driver)
    }

    #[tokio::test]
    async fn create_tables_renders_the_whole_schema() {
        let (db, driver) = handle();
        db.create_tables().await.unwrap();
        let log = driver.sql_log();
        assert_eq!(log.len(), 1);
        assert!(log[0].starts_with("CREATE TABLE IF NOT EXISTS \"users\""));
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let (db, driver) = handle();
        db.transaction(|tx| async move {
            tx.query("users")
                .insert(record! { "id" => 1, "name" => "A" })
                .execute()
                .await?;
            Ok(())
        })
        .await
        .unwrap();

        let log = driver.sql_log();
        assert_eq!(log[0], "BEGIN");
        assert!(log[1].starts_with("INSERT INTO \"users\""));
        assert_eq!(log[2], "COMMIT");
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_failure() {
        let (db, driver) = handle();
        driver.push_error("boom");

        let err = db
            .transaction(|tx| async move {
                tx.query("users")
                    .insert(record! { "id" => 1, "name" => "A" })
                    .execute()
                    .await?;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("boom"));
        let log = driver.sql_log();
        assert_eq!(log[0], "BEGIN");
        assert_eq!(log[2], "ROLLBACK");
    }

    #[tokio::test]
    async fn nested_transactions_are_flattened() {
        let (db, driver) = handle();
        db.transaction(|tx| async move {
            tx.transaction(|inner| async move {
                inner.raw("SELECT 1", &[]).await?;
                Ok(())
            })
            .await
        })
        .await
        .unwrap();

        // One BEGIN/COMMIT pair only.
        assert_eq!(driver.sql_log(), vec!["BEGIN", "SELECT 1", "COMMIT"]);
    }

    #[tokio::test]
    async fn invalid_schema_is_rejected_at_construction() {
        let bad = DatabaseSchema::new().table(
            "t",
            TableSchema::new().column("status", ColumnDef::new(ColumnType::Enum(vec![]))),
        );
        let driver: Arc<dyn crate::driver::Driver> = Arc::new(RecordingDriver::new());
        assert!(Database::new(bad, driver).is_err());
    }
}
