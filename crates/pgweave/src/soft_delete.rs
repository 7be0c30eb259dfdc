//! Soft-delete overlay configuration.
//!
//! The overlay transparently scopes SELECT, UPDATE and `count()` on covered
//! tables to non-trashed rows by injecting a predicate on the configured
//! timestamp column at render time. The injection itself lives in the query
//! renderer; this module only carries the configuration and the per-builder
//! scope.

use std::collections::HashSet;

/// Per-handle soft-delete configuration: the covered tables and the
/// timestamp column marking a row as trashed.
#[derive(Debug, Clone)]
pub struct SoftDeleteConfig {
    tables: HashSet<String>,
    column: String,
}

impl SoftDeleteConfig {
    /// Cover the given tables using the default `deleted_at` column.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            column: "deleted_at".to_string(),
        }
    }

    /// Use a different timestamp column.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn covers(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn column_name(&self) -> &str {
        &self.column
    }
}

/// How a single builder interacts with the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftDeleteScope {
    /// Honour the overlay: covered tables see only non-trashed rows.
    #[default]
    Default,
    /// `with_trashed()`: no predicate is injected.
    IncludeAll,
    /// `only_trashed()`: only trashed rows are visible.
    OnlyTrashed,
}
