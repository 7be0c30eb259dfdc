//! Query logging hook.
//!
//! A [`QueryLogger`] observes every statement a wrapped driver executes; see
//! [`LoggingDriver`](crate::driver::LoggingDriver) for the wrapping side.

use std::time::Duration;

use crate::value::Value;

/// Observer invoked after every statement execution.
///
/// Implementations must not assume the statement succeeded: the hook fires
/// on failures too, before the error propagates. A panicking logger is
/// tolerated and never alters the query outcome.
pub trait QueryLogger: Send + Sync {
    fn log(&self, sql: &str, params: &[Value], elapsed: Duration);
}

/// A logger that emits each statement as a `tracing` debug event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log(&self, sql: &str, params: &[Value], elapsed: Duration) {
        tracing::debug!(
            target: "pgweave::sql",
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            params = params.len(),
            "{sql}"
        );
    }
}
