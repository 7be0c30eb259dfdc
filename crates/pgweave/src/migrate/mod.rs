//! The migration runner.
//!
//! A small state machine over a tracking table: each `up()` applies every
//! pending migration under one fresh batch number, each `down()` unwinds
//! the latest batch in reverse name order. Migration code is supplied
//! through an explicit registry keyed by file name (there is no dynamic
//! loading); the directory listing still drives ordering and the
//! pending-set computation, and `make()` scaffolds new files into it.
//!
//! The runner deliberately does not wrap a batch in a transaction: whether
//! partial progress persists on failure is the migration author's call, via
//! the surrounding driver transaction semantics.

mod editor;

pub use editor::SchemaEditor;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::driver::Driver;
use crate::error::{WeaveError, WeaveResult};
use crate::ident::quote_ident;
use crate::value::Value;

/// Extension of migration source files.
const SOURCE_EXT: &str = ".rs";

/// One migration: a pair of async steps run with a [`SchemaEditor`].
///
/// Every registered module must provide both directions; that is the
/// loader-level contract the registry enforces by construction.
#[async_trait]
pub trait MigrationModule: Send + Sync {
    async fn up(&self, editor: &SchemaEditor) -> WeaveResult<()>;
    async fn down(&self, editor: &SchemaEditor) -> WeaveResult<()>;
}

/// Runs migrations against a driver, tracking state in a dedicated table.
pub struct MigrationRunner {
    driver: Arc<dyn Driver>,
    dir: Option<PathBuf>,
    table: String,
    registry: BTreeMap<String, Arc<dyn MigrationModule>>,
}

impl MigrationRunner {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            dir: None,
            table: "migrations".to_string(),
            registry: BTreeMap::new(),
        }
    }

    /// Set the migrations directory used for discovery and `make()`.
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Use a different tracking table name.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = name.into();
        self
    }

    /// Register the module backing a migration name.
    pub fn register(mut self, name: impl Into<String>, module: Arc<dyn MigrationModule>) -> Self {
        self.registry.insert(name.into(), module);
        self
    }

    fn editor(&self) -> SchemaEditor {
        SchemaEditor::new(self.driver.clone())
    }

    /// Apply every pending migration; returns the applied names in order.
    ///
    /// All migrations applied by one call share a fresh batch number
    /// (`max(batch) + 1`). Concurrent runners are serialised only by the
    /// tracking table's UNIQUE name constraint: the loser's insert fails.
    pub async fn up(&self) -> WeaveResult<Vec<String>> {
        self.ensure_tracking_table().await?;

        let executed: HashSet<String> = self.executed_names().await?.into_iter().collect();
        let pending: Vec<String> = self
            .discover()?
            .into_iter()
            .filter(|name| !executed.contains(name))
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let batch = self.max_batch().await? + 1;
        let insert_sql = format!(
            "INSERT INTO {} (\"name\", \"batch\") VALUES ($1, $2)",
            quote_ident(&self.table)
        );

        let editor = self.editor();
        for name in &pending {
            let module = self.registry.get(name).ok_or_else(|| {
                WeaveError::migration(format!("migration \"{name}\" is not registered"))
            })?;
            tracing::debug!(migration = %name, batch, "applying migration");
            module.up(&editor).await?;
            self.driver
                .exec(
                    &insert_sql,
                    &[Value::Text(name.clone()), Value::Int(batch)],
                )
                .await?;
        }

        Ok(pending)
    }

    /// Roll back the latest batch; returns the rolled-back names in
    /// reverse lexicographic order.
    pub async fn down(&self) -> WeaveResult<Vec<String>> {
        self.ensure_tracking_table().await?;

        let batch = self.max_batch().await?;
        if batch == 0 {
            return Ok(Vec::new());
        }

        let select_sql = format!(
            "SELECT \"name\" FROM {} WHERE \"batch\" = $1 ORDER BY \"name\" DESC",
            quote_ident(&self.table)
        );
        let result = self.driver.exec(&select_sql, &[Value::Int(batch)]).await?;
        let names: Vec<String> = result
            .rows
            .iter()
            .filter_map(|row| match row.get("name") {
                Some(Value::Text(name)) => Some(name.clone()),
                _ => None,
            })
            .collect();

        let delete_sql = format!(
            "DELETE FROM {} WHERE \"name\" = $1",
            quote_ident(&self.table)
        );

        let editor = self.editor();
        for name in &names {
            let module = self.registry.get(name).ok_or_else(|| {
                WeaveError::migration(format!("migration \"{name}\" is not registered"))
            })?;
            tracing::debug!(migration = %name, batch, "reverting migration");
            module.down(&editor).await?;
            self.driver
                .exec(&delete_sql, &[Value::Text(name.clone())])
                .await?;
        }

        Ok(names)
    }

    /// Scaffold a new migration file `<YYYYMMDDHHMMSS>_<name>.rs` in the
    /// configured directory, creating the directory if missing.
    pub fn make(&self, name: &str) -> WeaveResult<PathBuf> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| WeaveError::migration("no migrations directory configured"))?;
        scaffold(dir, name)
    }

    /// List migration names: directory files (sorted, extension stripped,
    /// declaration files excluded) or, with no directory configured, the
    /// registry keys.
    fn discover(&self) -> WeaveResult<Vec<String>> {
        let Some(dir) = &self.dir else {
            return Ok(self.registry.keys().cloned().collect());
        };
        discover_in(dir)
    }

    async fn ensure_tracking_table(&self) -> WeaveResult<()> {
        // SERIAL, UNIQUE and CURRENT_TIMESTAMP exceed the schema model, so
        // the tracking table uses its own DDL.
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             \"id\" SERIAL PRIMARY KEY, \
             \"name\" TEXT NOT NULL UNIQUE, \
             \"batch\" INTEGER NOT NULL, \
             \"executed_at\" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            quote_ident(&self.table)
        );
        self.driver
            .exec(&sql, &[])
            .await
            .map_err(|e| WeaveError::migration(format!("tracking table inaccessible: {e}")))?;
        Ok(())
    }

    async fn executed_names(&self) -> WeaveResult<Vec<String>> {
        let sql = format!(
            "SELECT \"name\" FROM {} ORDER BY \"name\" ASC",
            quote_ident(&self.table)
        );
        let result = self.driver.exec(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| match row.get("name") {
                Some(Value::Text(name)) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    async fn max_batch(&self) -> WeaveResult<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX(\"batch\"), 0) AS \"batch\" FROM {}",
            quote_ident(&self.table)
        );
        let result = self.driver.exec(&sql, &[]).await?;
        match result.rows.first().and_then(|row| row.values().next()) {
            None => Ok(0),
            Some(Value::Int(n)) => Ok(*n),
            Some(Value::Text(s)) => s.parse::<i64>().map_err(|_| {
                WeaveError::migration(format!("tracking table returned non-numeric batch {s:?}"))
            }),
            Some(other) => Err(WeaveError::migration(format!(
                "tracking table returned unexpected batch {other:?}"
            ))),
        }
    }
}

/// Write a scaffold migration file into `dir`, creating it if missing.
///
/// The file is `<YYYYMMDDHHMMSS>_<name>.rs` with an empty up/down template;
/// an existing file is never overwritten. Names must match
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn scaffold(dir: &Path, name: &str) -> WeaveResult<PathBuf> {
    if !valid_migration_name(name) {
        return Err(WeaveError::migration(format!(
            "invalid migration name {name:?}: expected [A-Za-z_][A-Za-z0-9_]*"
        )));
    }

    fs::create_dir_all(dir)
        .map_err(|e| WeaveError::migration(format!("failed to create {}: {e}", dir.display())))?;

    let prefix = Utc::now().format("%Y%m%d%H%M%S");
    let path = dir.join(format!("{prefix}_{name}{SOURCE_EXT}"));
    if path.exists() {
        return Err(WeaveError::migration(format!(
            "refusing to overwrite {}",
            path.display()
        )));
    }

    fs::write(&path, SCAFFOLD)
        .map_err(|e| WeaveError::migration(format!("failed to write {}: {e}", path.display())))?;
    Ok(path)
}

fn discover_in(dir: &Path) -> WeaveResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        WeaveError::migration(format!("failed to read migrations dir {}: {e}", dir.display()))
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            WeaveError::migration(format!("failed to read entry in {}: {e}", dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        // mod.rs declares the registry, it is not a migration itself.
        if file_name == "mod.rs" {
            continue;
        }
        if let Some(stem) = file_name.strip_suffix(SOURCE_EXT) {
            names.push(stem.to_string());
        }
    }

    names.sort();
    Ok(names)
}

fn valid_migration_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

const SCAFFOLD: &str = "\
use async_trait::async_trait;
use pgweave::migrate::{MigrationModule, SchemaEditor};
use pgweave::WeaveResult;

pub struct Migration;

#[async_trait]
impl MigrationModule for Migration {
    async fn up(&self, editor: &SchemaEditor) -> WeaveResult<()> {
        let _ = editor;
        Ok(())
    }

    async fn down(&self, editor: &SchemaEditor) -> WeaveResult<()> {
        let _ = editor;
        Ok(())
    }
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ExecResult, RecordingDriver, Row};
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("pgweave-migrate-test-{nonce}"));
        fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn name_row(name: &str) -> Row {
        let mut row = Row::new();
        row.insert("name".to_string(), Value::Text(name.to_string()));
        row
    }

    fn batch_row(batch: i64) -> Row {
        let mut row = Row::new();
        row.insert("batch".to_string(), Value::Int(batch));
        row
    }

    /// Records the order its steps run in.
    struct Traced {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MigrationModule for Traced {
        async fn up(&self, editor: &SchemaEditor) -> WeaveResult<()> {
            self.log.lock().unwrap().push(format!("up:{}", self.label));
            editor.sql(&format!("-- up {}", self.label), &[]).await?;
            Ok(())
        }

        async fn down(&self, editor: &SchemaEditor) -> WeaveResult<()> {
            self.log.lock().unwrap().push(format!("down:{}", self.label));
            editor.sql(&format!("-- down {}", self.label), &[]).await?;
            Ok(())
        }
    }

    fn traced_runner(driver: &RecordingDriver) -> (MigrationRunner, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = MigrationRunner::new(Arc::new(driver.clone()))
            .register(
                "20240101000000_create_users",
                Arc::new(Traced {
                    label: "users",
                    log: log.clone(),
                }),
            )
            .register(
                "20240102000000_create_posts",
                Arc::new(Traced {
                    label: "posts",
                    log: log.clone(),
                }),
            );
        (runner, log)
    }

    #[tokio::test]
    async fn up_applies_pending_in_order_with_one_batch() {
        let driver = RecordingDriver::new();
        let (runner, log) = traced_runner(&driver);

        let applied = runner.up().await.unwrap();
        assert_eq!(
            applied,
            vec!["20240101000000_create_users", "20240102000000_create_posts"]
        );
        assert_eq!(log.lock().unwrap().as_slice(), ["up:users", "up:posts"]);

        // Both tracking inserts carry the same fresh batch number.
        let inserts: Vec<_> = driver
            .calls()
            .into_iter()
            .filter(|c| c.sql.starts_with("INSERT INTO \"migrations\""))
            .collect();
        assert_eq!(inserts.len(), 2);
        for insert in &inserts {
            assert_eq!(insert.params[1], Value::Int(1));
        }
    }

    #[tokio::test]
    async fn up_skips_already_executed_and_bumps_the_batch() {
        let driver = RecordingDriver::new();
        let (runner, log) = traced_runner(&driver);

        driver.push_result(ExecResult::default()); // ensure table
        driver.push_result(ExecResult::with_rows(vec![name_row(
            "20240101000000_create_users",
        )]));
        driver.push_result(ExecResult::with_rows(vec![batch_row(3)]));

        let applied = runner.up().await.unwrap();
        assert_eq!(applied, vec!["20240102000000_create_posts"]);
        assert_eq!(log.lock().unwrap().as_slice(), ["up:posts"]);

        let insert = driver
            .calls()
            .into_iter()
            .find(|c| c.sql.starts_with("INSERT INTO \"migrations\""))
            .unwrap();
        assert_eq!(insert.params[1], Value::Int(4));
    }

    #[tokio::test]
    async fn up_with_nothing_pending_is_a_no_op() {
        let driver = RecordingDriver::new();
        let (runner, log) = traced_runner(&driver);

        driver.push_result(ExecResult::default());
        driver.push_result(ExecResult::with_rows(vec![
            name_row("20240101000000_create_users"),
            name_row("20240102000000_create_posts"),
        ]));

        assert!(runner.up().await.unwrap().is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn down_unwinds_the_latest_batch_in_reverse_name_order() {
        let driver = RecordingDriver::new();
        let (runner, log) = traced_runner(&driver);

        driver.push_result(ExecResult::default()); // ensure table
        driver.push_result(ExecResult::with_rows(vec![batch_row(2)]));
        driver.push_result(ExecResult::with_rows(vec![
            name_row("20240102000000_create_posts"),
            name_row("20240101000000_create_users"),
        ]));

        let rolled = runner.down().await.unwrap();
        assert_eq!(
            rolled,
            vec!["20240102000000_create_posts", "20240101000000_create_users"]
        );
        assert_eq!(log.lock().unwrap().as_slice(), ["down:posts", "down:users"]);

        let deletes: Vec<_> = driver
            .calls()
            .into_iter()
            .filter(|c| c.sql.starts_with("DELETE FROM \"migrations\""))
            .collect();
        assert_eq!(deletes.len(), 2);
        assert_eq!(
            deletes[0].params[0],
            Value::Text("20240102000000_create_posts".to_string())
        );
    }

    #[tokio::test]
    async fn down_on_empty_tracking_table_does_nothing() {
        let driver = RecordingDriver::new();
        let (runner, log) = traced_runner(&driver);

        assert!(runner.down().await.unwrap().is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unregistered_migration_is_an_error() {
        let driver = RecordingDriver::new();
        let dir = make_temp_dir();
        fs::write(dir.join("20240101000000_orphan.rs"), "").unwrap();

        let runner = MigrationRunner::new(Arc::new(driver)).directory(&dir);
        let err = runner.up().await.unwrap_err();
        assert!(err.to_string().contains("not registered"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn discovery_sorts_and_filters() {
        let dir = make_temp_dir();
        fs::write(dir.join("20240102000000_b.rs"), "").unwrap();
        fs::write(dir.join("20240101000000_a.rs"), "").unwrap();
        fs::write(dir.join("mod.rs"), "").unwrap();
        fs::write(dir.join("README.md"), "").unwrap();

        let names = discover_in(&dir).unwrap();
        assert_eq!(names, vec!["20240101000000_a", "20240102000000_b"]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn make_scaffolds_a_timestamped_file() {
        let dir = make_temp_dir();
        let runner = MigrationRunner::new(Arc::new(RecordingDriver::new())).directory(&dir);

        let path = runner.make("add_users").unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.ends_with("_add_users.rs"));
        // 14-digit timestamp prefix.
        assert_eq!(file_name.split('_').next().unwrap().len(), 14);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("impl MigrationModule for Migration"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn make_rejects_invalid_names() {
        let dir = make_temp_dir();
        let runner = MigrationRunner::new(Arc::new(RecordingDriver::new())).directory(&dir);

        assert!(runner.make("1starts_with_digit").is_err());
        assert!(runner.make("has-dash").is_err());
        assert!(runner.make("").is_err());
        assert!(runner.make("_ok").is_ok());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn unreadable_directory_is_a_migration_error() {
        let missing = std::env::temp_dir().join("pgweave-migrate-test-definitely-missing");
        let err = discover_in(&missing).unwrap_err();
        assert!(matches!(err, WeaveError::Migration(_)));
    }
}
