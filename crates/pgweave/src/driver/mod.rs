//! The driver abstraction.
//!
//! The core depends only on the [`Driver`] contract; concrete Postgres and
//! in-memory recording drivers sit behind it. All I/O lives here; the
//! builder and the migration runner are pure orchestration on top.

mod logging;
mod postgres;
mod recording;

pub use logging::LoggingDriver;
pub use postgres::PgDriver;
pub use recording::{RecordedCall, RecordingDriver};

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::WeaveResult;
use crate::value::Value;

/// One result row: column name to decoded value, in projection order.
pub type Row = IndexMap<String, Value>;

/// The outcome of a single statement execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl ExecResult {
    /// Build a result from rows; `row_count` follows the row count.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }
}

/// A pluggable query-execution backend.
///
/// `begin` emits `BEGIN` and returns a transaction-bound driver sharing the
/// same connection; `commit`/`rollback` are only meaningful on that bound
/// driver. The transaction facade on [`Database`](crate::Database) layers
/// the callback-style commit-on-success/rollback-on-failure semantics on
/// top of these three primitives.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Execute one statement with positional `$N` parameters.
    async fn exec(&self, sql: &str, params: &[Value]) -> WeaveResult<ExecResult>;

    /// Start a transaction and return a driver bound to it.
    async fn begin(&self) -> WeaveResult<Arc<dyn Driver>>;

    /// Commit the transaction this driver is bound to.
    async fn commit(&self) -> WeaveResult<()>;

    /// Roll back the transaction this driver is bound to.
    async fn rollback(&self) -> WeaveResult<()>;

    /// Whether this driver is transaction-bound.
    fn in_transaction(&self) -> bool;

    /// Release the underlying connection.
    async fn close(&self) -> WeaveResult<()>;
}
