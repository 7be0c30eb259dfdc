//! In-memory recording driver.
//!
//! Records every statement it receives (including transaction control) and
//! answers from a queue of canned results. The whole test suite runs against
//! it without a live database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::driver::{Driver, ExecResult};
use crate::error::{WeaveError, WeaveResult};
use crate::value::Value;

/// One recorded statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct RecordingState {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<WeaveResult<ExecResult>>>,
}

impl RecordingState {
    fn record(&self, sql: &str, params: &[Value]) {
        self.calls.lock().unwrap().push(RecordedCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

/// A driver double that records statements and replays canned results.
///
/// Transaction-bound clones share the same recorded log, so a test sees
/// `BEGIN`, the statements, and `COMMIT`/`ROLLBACK` in execution order.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    state: Arc<RecordingState>,
    in_tx: bool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next unanswered `exec`.
    pub fn push_result(&self, result: ExecResult) {
        self.state.responses.lock().unwrap().push_back(Ok(result));
    }

    /// Queue a driver error for the next unanswered `exec`.
    pub fn push_error(&self, message: impl Into<String>) {
        self.state
            .responses
            .lock()
            .unwrap()
            .push_back(Err(WeaveError::driver(message)));
    }

    /// Everything executed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// The SQL strings executed so far, in order.
    pub fn sql_log(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.sql.clone())
            .collect()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn exec(&self, sql: &str, params: &[Value]) -> WeaveResult<ExecResult> {
        self.state.record(sql, params);
        self.state
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecResult::default()))
    }

    async fn begin(&self) -> WeaveResult<Arc<dyn Driver>> {
        self.state.record("BEGIN", &[]);
        Ok(Arc::new(RecordingDriver {
            state: self.state.clone(),
            in_tx: true,
        }))
    }

    async fn commit(&self) -> WeaveResult<()> {
        if !self.in_tx {
            return Err(WeaveError::driver("commit outside a transaction"));
        }
        self.state.record("COMMIT", &[]);
        Ok(())
    }

    async fn rollback(&self) -> WeaveResult<()> {
        if !self.in_tx {
            return Err(WeaveError::driver("rollback outside a transaction"));
        }
        self.state.record("ROLLBACK", &[]);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    async fn close(&self) -> WeaveResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Row;

    #[tokio::test]
    async fn records_and_replays() {
        let driver = RecordingDriver::new();
        let mut row = Row::new();
        row.insert("n".to_string(), Value::Int(1));
        driver.push_result(ExecResult::with_rows(vec![row]));

        let got = driver
            .exec("SELECT 1 AS \"n\"", &[Value::Int(5)])
            .await
            .unwrap();
        assert_eq!(got.row_count, 1);
        assert_eq!(
            driver.calls(),
            vec![RecordedCall {
                sql: "SELECT 1 AS \"n\"".to_string(),
                params: vec![Value::Int(5)],
            }]
        );
    }

    #[tokio::test]
    async fn transaction_control_shares_the_log() {
        let driver = RecordingDriver::new();
        let tx = driver.begin().await.unwrap();
        tx.exec("SELECT 1", &[]).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(driver.sql_log(), vec!["BEGIN", "SELECT 1", "COMMIT"]);
    }

    #[tokio::test]
    async fn commit_outside_transaction_fails() {
        let driver = RecordingDriver::new();
        assert!(driver.commit().await.is_err());
        assert!(driver.rollback().await.is_err());
    }
}
