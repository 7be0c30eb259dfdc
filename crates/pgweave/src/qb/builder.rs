//! The query IR and its chainable building API.

use std::sync::Arc;

use chrono::Utc;

use crate::driver::{Driver, ExecResult, Row};
use crate::error::{WeaveError, WeaveResult};
use crate::qb::filter::Filter;
use crate::soft_delete::{SoftDeleteConfig, SoftDeleteScope};
use crate::value::Value;

/// An ordered list of `(column, value)` assignments, used for INSERT rows,
/// UPDATE SET clauses and ON CONFLICT DO UPDATE. See [`record!`](crate::record).
pub type Assignments = Vec<(String, Value)>;

/// The query source: a base table or an aliased subquery.
#[derive(Clone)]
pub(crate) enum Source {
    Table(String),
    Subquery {
        inner: Box<QueryBuilder>,
        alias: String,
    },
}

/// The operation a builder is accumulating.
#[derive(Clone)]
pub(crate) enum Operation {
    Select,
    Insert(Vec<Assignments>),
    Update(Assignments),
    Delete,
}

/// Predicate connector; the first predicate's connector is dropped at
/// render time, subsequent ones emit verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Connector {
    And,
    Or,
}

/// One desugared WHERE predicate.
#[derive(Clone)]
pub(crate) struct Predicate {
    pub(crate) connector: Connector,
    pub(crate) column: String,
    pub(crate) op: PredicateOp,
}

#[derive(Clone)]
pub(crate) enum PredicateOp {
    Cmp { op: &'static str, value: Value },
    IsNull,
    IsNotNull,
    In { values: Vec<Value>, negated: bool },
    Between { lo: Value, hi: Value },
    InSubquery(Box<QueryBuilder>),
    /// Empty `IN` list.
    ConstFalse,
    /// Empty `NOT IN` list.
    ConstTrue,
}

/// Join kind; mutations reject joins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Clone)]
pub(crate) struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) table: String,
    pub(crate) left: String,
    pub(crate) op: String,
    pub(crate) right: String,
}

/// Sort direction for `order_by`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A raw HAVING fragment; its `$N` placeholders start at `$1` and are
/// renumbered to the outer query's next indices at render time.
#[derive(Clone)]
pub(crate) struct HavingClause {
    pub(crate) fragment: String,
    pub(crate) values: Vec<Value>,
}

#[derive(Clone)]
pub(crate) enum ConflictAction {
    DoNothing,
    DoUpdate(Assignments),
}

#[derive(Clone)]
pub(crate) struct OnConflict {
    pub(crate) columns: Vec<String>,
    pub(crate) action: ConflictAction,
}

/// RETURNING policy for mutations; has no effect on SELECT.
#[derive(Clone, Default)]
pub(crate) enum Returning {
    /// `RETURNING *` for mutations.
    #[default]
    Default,
    Columns(Vec<String>),
    Suppressed,
}

/// A chainable builder accumulating a pending query.
///
/// Builders are single-caller values: each chain method appends to the
/// in-flight representation and returns it. Terminal methods render the
/// representation to `(sql, params)` and execute against the driver.
///
/// Successive `filter`/`or_filter` predicates are flattened into one
/// sequence without parentheses, relying on SQL's AND/OR precedence;
/// callers needing strict grouping should use subqueries.
#[derive(Clone)]
pub struct QueryBuilder {
    pub(crate) source: Source,
    pub(crate) op: Operation,
    op_set: bool,
    pub(crate) projection: Vec<String>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) joins: Vec<Join>,
    pub(crate) order_by: Vec<(String, Order)>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Vec<HavingClause>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) on_conflict: Option<OnConflict>,
    pub(crate) returning: Returning,
    pub(crate) scope: SoftDeleteScope,
    pub(crate) overlay: Option<Arc<SoftDeleteConfig>>,
    driver: Arc<dyn Driver>,
    pub(crate) error: Option<WeaveError>,
}

impl QueryBuilder {
    pub(crate) fn new(
        table: impl Into<String>,
        driver: Arc<dyn Driver>,
        overlay: Option<Arc<SoftDeleteConfig>>,
    ) -> Self {
        Self::with_source(Source::Table(table.into()), driver, overlay)
    }

    pub(crate) fn from_subquery(
        inner: QueryBuilder,
        alias: impl Into<String>,
        driver: Arc<dyn Driver>,
        overlay: Option<Arc<SoftDeleteConfig>>,
    ) -> Self {
        Self::with_source(
            Source::Subquery {
                inner: Box::new(inner),
                alias: alias.into(),
            },
            driver,
            overlay,
        )
    }

    fn with_source(
        source: Source,
        driver: Arc<dyn Driver>,
        overlay: Option<Arc<SoftDeleteConfig>>,
    ) -> Self {
        Self {
            source,
            op: Operation::Select,
            op_set: false,
            projection: Vec::new(),
            predicates: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            limit: None,
            offset: None,
            on_conflict: None,
            returning: Returning::Default,
            scope: SoftDeleteScope::Default,
            overlay,
            driver,
            error: None,
        }
    }

    /// Record the first configuration error; terminals surface it.
    fn defer(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(WeaveError::configuration(message));
        }
    }

    fn set_operation(&mut self, op: Operation) {
        if self.op_set {
            self.defer("operation already chosen for this query");
            return;
        }
        self.op = op;
        self.op_set = true;
    }

    // ==================== Operation selection ====================

    /// SELECT the given columns; an empty list selects `*`.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_operation(Operation::Select);
        self.projection = columns.into_iter().map(Into::into).collect();
        self
    }

    /// INSERT a single row.
    pub fn insert(self, row: Assignments) -> Self {
        self.insert_many(vec![row])
    }

    /// INSERT a batch of rows.
    ///
    /// The column set is taken from the first row; each subsequent row is
    /// looked up by column name, missing columns contribute SQL NULL.
    pub fn insert_many(mut self, rows: Vec<Assignments>) -> Self {
        if rows.is_empty() || rows[0].is_empty() {
            self.defer("INSERT requires at least one row with at least one column");
            return self;
        }
        self.set_operation(Operation::Insert(rows));
        self
    }

    /// UPDATE with the given SET assignments.
    pub fn update(mut self, assignments: Assignments) -> Self {
        if assignments.is_empty() {
            self.defer("UPDATE requires at least one assignment");
            return self;
        }
        self.set_operation(Operation::Update(assignments));
        self
    }

    /// DELETE (hard delete; the soft-delete overlay does not apply).
    pub fn delete(mut self) -> Self {
        self.set_operation(Operation::Delete);
        self
    }

    // ==================== Filters ====================

    /// AND-append predicates; each pair is `(column, filter)` and plain
    /// values desugar to equality.
    pub fn filter<I, S, F>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (S, F)>,
        S: Into<String>,
        F: Into<Filter>,
    {
        self.push_filters(Connector::And, conditions)
    }

    /// OR-append predicates.
    pub fn or_filter<I, S, F>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (S, F)>,
        S: Into<String>,
        F: Into<Filter>,
    {
        self.push_filters(Connector::Or, conditions)
    }

    fn push_filters<I, S, F>(mut self, connector: Connector, conditions: I) -> Self
    where
        I: IntoIterator<Item = (S, F)>,
        S: Into<String>,
        F: Into<Filter>,
    {
        for (column, filter) in conditions {
            match filter.into().into_predicate(connector, column.into()) {
                Ok(predicate) => self.predicates.push(predicate),
                Err(e) => {
                    if self.error.is_none() {
                        self.error = Some(e);
                    }
                }
            }
        }
        self
    }

    // ==================== Joins ====================

    /// Append a join with an explicit ON operator token.
    pub fn join(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        left: impl Into<String>,
        op: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            left: left.into(),
            op: op.into(),
            right: right.into(),
        });
        self
    }

    /// `INNER JOIN table ON left = right`.
    pub fn inner_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.join(JoinKind::Inner, table, left, "=", right)
    }

    /// `LEFT JOIN table ON left = right`.
    pub fn left_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.join(JoinKind::Left, table, left, "=", right)
    }

    /// `RIGHT JOIN table ON left = right`.
    pub fn right_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.join(JoinKind::Right, table, left, "=", right)
    }

    /// `FULL OUTER JOIN table ON left = right`.
    pub fn full_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.join(JoinKind::Full, table, left, "=", right)
    }

    // ==================== Ordering, grouping, paging ====================

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Append a raw HAVING fragment. Its `$N` placeholders are numbered
    /// from `$1` within the fragment and rebased at render time; multiple
    /// calls are joined with AND.
    pub fn having<I, T>(mut self, fragment: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.having.push(HavingClause {
            fragment: fragment.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    // ==================== ON CONFLICT ====================

    /// Start an `ON CONFLICT (columns)` clause (INSERT only).
    pub fn on_conflict<I, S>(self, columns: I) -> OnConflictBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OnConflictBuilder {
            builder: self,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    // ==================== RETURNING ====================

    /// Return the given columns from a mutation instead of `*`.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = Returning::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Omit the RETURNING clause entirely.
    pub fn returning_none(mut self) -> Self {
        self.returning = Returning::Suppressed;
        self
    }

    // ==================== Soft-delete scope ====================

    /// Include trashed rows: the overlay injects nothing.
    pub fn with_trashed(mut self) -> Self {
        self.scope = SoftDeleteScope::IncludeAll;
        self
    }

    /// See only trashed rows.
    pub fn only_trashed(mut self) -> Self {
        self.scope = SoftDeleteScope::OnlyTrashed;
        self
    }

    fn overlay_for_source(&self) -> WeaveResult<Arc<SoftDeleteConfig>> {
        let Source::Table(table) = &self.source else {
            return Err(WeaveError::configuration(
                "soft delete operators require a base table",
            ));
        };
        match &self.overlay {
            Some(cfg) if cfg.covers(table) => Ok(cfg.clone()),
            _ => Err(WeaveError::configuration(format!(
                "soft delete is not enabled for table \"{table}\""
            ))),
        }
    }

    // ==================== Terminals ====================

    /// Execute the accumulated query.
    pub async fn execute(self) -> WeaveResult<ExecResult> {
        let driver = self.driver.clone();
        let (sql, params) = self.to_sql_params()?;
        driver.exec(&sql, &params).await
    }

    /// Append `LIMIT 1`, execute, and return the first row if any.
    pub async fn first(mut self) -> WeaveResult<Option<Row>> {
        self.limit = Some(1);
        let result = self.execute().await?;
        Ok(result.rows.into_iter().next())
    }

    /// Execute `SELECT COUNT(*)` over the same source, joins, filters and
    /// soft-delete overlay.
    ///
    /// Projection, ORDER BY, LIMIT, OFFSET, GROUP BY and HAVING are
    /// deliberately ignored: this is a filtered-cardinality shortcut, not an
    /// aggregated count.
    pub async fn count(self) -> WeaveResult<i64> {
        let driver = self.driver.clone();
        let (sql, params) = self.to_count_sql_params()?;
        let result = driver.exec(&sql, &params).await?;

        let cell = result
            .rows
            .first()
            .and_then(|row| row.values().next())
            .ok_or_else(|| WeaveError::driver("count query returned no rows"))?;
        match cell {
            Value::Int(n) => Ok(*n),
            Value::Float(f) => Ok(*f as i64),
            Value::Text(s) => s
                .parse::<i64>()
                .map_err(|_| WeaveError::driver(format!("count query returned non-numeric {s:?}"))),
            other => Err(WeaveError::driver(format!(
                "count query returned unexpected {other:?}"
            ))),
        }
    }

    /// Mark the matching rows as trashed: an UPDATE setting the overlay
    /// column to the current timestamp, scoped to non-trashed rows so it is
    /// idempotent. Fails if the table is not covered by the overlay.
    pub async fn soft_delete(mut self) -> WeaveResult<ExecResult> {
        let cfg = self.overlay_for_source()?;
        let column = cfg.column_name().to_string();
        self.set_operation(Operation::Update(vec![(
            column,
            Value::Timestamp(Utc::now().naive_utc()),
        )]));
        self.scope = SoftDeleteScope::Default;
        self.execute().await
    }

    /// Un-trash the matching rows: an UPDATE setting the overlay column back
    /// to NULL, scoped to trashed rows. Fails if the table is not covered.
    pub async fn restore(mut self) -> WeaveResult<ExecResult> {
        let cfg = self.overlay_for_source()?;
        let column = cfg.column_name().to_string();
        self.set_operation(Operation::Update(vec![(column, Value::Null)]));
        self.scope = SoftDeleteScope::OnlyTrashed;
        self.execute().await
    }
}

/// Second stage of `on_conflict`: pick the conflict action.
pub struct OnConflictBuilder {
    builder: QueryBuilder,
    columns: Vec<String>,
}

impl OnConflictBuilder {
    /// `ON CONFLICT (...) DO NOTHING`.
    pub fn do_nothing(mut self) -> QueryBuilder {
        self.builder.on_conflict = Some(OnConflict {
            columns: self.columns,
            action: ConflictAction::DoNothing,
        });
        self.builder
    }

    /// `ON CONFLICT (...) DO UPDATE SET ...`; assignment values are
    /// appended to the parameter vector after the row values.
    pub fn do_update(mut self, assignments: Assignments) -> QueryBuilder {
        self.builder.on_conflict = Some(OnConflict {
            columns: self.columns,
            action: ConflictAction::DoUpdate(assignments),
        });
        self.builder
    }
}
