//! Logger-hook driver wrapper.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::driver::{Driver, ExecResult};
use crate::error::WeaveResult;
use crate::logger::QueryLogger;
use crate::value::Value;

/// Wraps a driver and invokes a [`QueryLogger`] after every `exec`,
/// success or failure, then propagates the original outcome. Transaction
/// control and `close` pass through unmodified.
pub struct LoggingDriver {
    inner: Arc<dyn Driver>,
    logger: Arc<dyn QueryLogger>,
}

impl LoggingDriver {
    pub fn new(inner: Arc<dyn Driver>, logger: Arc<dyn QueryLogger>) -> Self {
        Self { inner, logger }
    }
}

#[async_trait]
impl Driver for LoggingDriver {
    async fn exec(&self, sql: &str, params: &[Value]) -> WeaveResult<ExecResult> {
        let start = Instant::now();
        let outcome = self.inner.exec(sql, params).await;
        let elapsed = start.elapsed();

        // The logger runs after the query completes and must not change the
        // outcome, so a panicking implementation is swallowed.
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.logger.log(sql, params, elapsed);
        }));

        outcome
    }

    async fn begin(&self) -> WeaveResult<Arc<dyn Driver>> {
        self.inner.begin().await
    }

    async fn commit(&self) -> WeaveResult<()> {
        self.inner.commit().await
    }

    async fn rollback(&self) -> WeaveResult<()> {
        self.inner.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    async fn close(&self) -> WeaveResult<()> {
        self.inner.close().await
    }
}
