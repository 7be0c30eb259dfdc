//! SQL rendering for the query IR.
//!
//! Parameter indices are computed while rendering, never by re-parsing the
//! finished statement: every clause pushes its values onto one growing
//! vector and interpolates the resulting 1-based index. Nested subqueries
//! render standalone (their own `$1..$k` sequence) and are then rebased by
//! the caller's current parameter count, which keeps the final placeholder
//! sequence contiguous at any nesting depth.

use crate::error::{WeaveError, WeaveResult};
use crate::ident::{quote_column, quote_expr, quote_ident};
use crate::qb::builder::{
    ConflictAction, Connector, JoinKind, Operation, Predicate, PredicateOp, QueryBuilder,
    Returning, Source,
};
use crate::soft_delete::SoftDeleteScope;
use crate::value::Value;

impl QueryBuilder {
    /// Render the accumulated query to `(sql, params)` without executing.
    pub fn to_sql_params(&self) -> WeaveResult<(String, Vec<Value>)> {
        self.validate()?;
        let mut params = Vec::new();
        let sql = match &self.op {
            Operation::Select => self.render_select(&mut params, false)?,
            Operation::Insert(rows) => self.render_insert(rows, &mut params)?,
            Operation::Update(assignments) => self.render_update(assignments, &mut params)?,
            Operation::Delete => self.render_delete(&mut params)?,
        };
        Ok((sql, params))
    }

    /// Render the `SELECT COUNT(*)` companion query: same source, joins,
    /// filters and overlay; everything else dropped.
    pub(crate) fn to_count_sql_params(&self) -> WeaveResult<(String, Vec<Value>)> {
        self.validate()?;
        let mut params = Vec::new();
        let sql = self.render_select(&mut params, true)?;
        Ok((sql, params))
    }

    fn validate(&self) -> WeaveResult<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        let is_select = matches!(self.op, Operation::Select);
        let is_insert = matches!(self.op, Operation::Insert(_));
        if self.on_conflict.is_some() && !is_insert {
            return Err(WeaveError::configuration(
                "ON CONFLICT is only meaningful for INSERT",
            ));
        }
        if !is_select && !self.joins.is_empty() {
            return Err(WeaveError::configuration(
                "JOIN cannot be combined with INSERT, UPDATE or DELETE",
            ));
        }
        if let Some(conflict) = &self.on_conflict {
            if let ConflictAction::DoUpdate(assignments) = &conflict.action {
                if assignments.is_empty() {
                    return Err(WeaveError::configuration(
                        "ON CONFLICT DO UPDATE requires at least one assignment",
                    ));
                }
            }
        }
        Ok(())
    }

    // ==================== SELECT ====================

    fn render_select(&self, params: &mut Vec<Value>, count: bool) -> WeaveResult<String> {
        let projection = if count {
            "COUNT(*)".to_string()
        } else if self.projection.is_empty() {
            "*".to_string()
        } else {
            self.projection
                .iter()
                .map(|c| quote_expr(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {projection} FROM {}", self.render_source(params)?);
        sql.push_str(&self.render_joins());
        sql.push_str(&self.render_where(params, true)?);

        if count {
            return Ok(sql);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(
                &self
                    .group_by
                    .iter()
                    .map(|c| quote_expr(c))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        if !self.having.is_empty() {
            let mut fragments = Vec::with_capacity(self.having.len());
            for clause in &self.having {
                fragments.push(shift_placeholders(&clause.fragment, params.len()));
                params.extend(clause.values.iter().cloned());
            }
            sql.push_str(" HAVING ");
            sql.push_str(&fragments.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let parts = self
                .order_by
                .iter()
                .map(|(col, order)| format!("{} {}", quote_expr(col), order_sql(*order)))
                .collect::<Vec<_>>();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(sql)
    }

    fn render_source(&self, params: &mut Vec<Value>) -> WeaveResult<String> {
        match &self.source {
            Source::Table(table) => Ok(quote_ident(table)),
            Source::Subquery { inner, alias } => {
                let (inner_sql, inner_params) = inner.to_sql_params()?;
                let shifted = shift_placeholders(&inner_sql, params.len());
                params.extend(inner_params);
                Ok(format!("({shifted}) AS {}", quote_ident(alias)))
            }
        }
    }

    fn render_joins(&self) -> String {
        let mut out = String::new();
        for join in &self.joins {
            out.push_str(&format!(
                " {} {} ON {} {} {}",
                join_sql(join.kind),
                quote_ident(&join.table),
                quote_column(&join.left),
                join.op,
                quote_column(&join.right),
            ));
        }
        out
    }

    // ==================== WHERE ====================

    /// Render the WHERE clause (with leading space), or an empty string.
    ///
    /// When `overlay` is set the soft-delete predicate is appended as a
    /// final AND in a render-time pass, so the filter API stays orthogonal
    /// to the overlay and `count()`/`first()` share it for free.
    fn render_where(&self, params: &mut Vec<Value>, overlay: bool) -> WeaveResult<String> {
        let mut parts = Vec::with_capacity(self.predicates.len() + 1);
        for predicate in &self.predicates {
            parts.push((predicate.connector, self.render_predicate(predicate, params)?));
        }
        if overlay {
            if let Some(injected) = self.overlay_predicate() {
                parts.push((injected.connector, self.render_predicate(&injected, params)?));
            }
        }

        if parts.is_empty() {
            return Ok(String::new());
        }

        let mut sql = String::from(" WHERE ");
        for (i, (connector, fragment)) in parts.iter().enumerate() {
            if i > 0 {
                sql.push_str(match connector {
                    Connector::And => " AND ",
                    Connector::Or => " OR ",
                });
            }
            sql.push_str(fragment);
        }
        Ok(sql)
    }

    /// The soft-delete predicate for this builder's scope, if any.
    fn overlay_predicate(&self) -> Option<Predicate> {
        let Source::Table(table) = &self.source else {
            return None;
        };
        let overlay = self.overlay.as_ref()?;
        if !overlay.covers(table) {
            return None;
        }
        let op = match self.scope {
            SoftDeleteScope::Default => PredicateOp::IsNull,
            SoftDeleteScope::OnlyTrashed => PredicateOp::IsNotNull,
            SoftDeleteScope::IncludeAll => return None,
        };
        Some(Predicate {
            connector: Connector::And,
            column: overlay.column_name().to_string(),
            op,
        })
    }

    fn render_predicate(
        &self,
        predicate: &Predicate,
        params: &mut Vec<Value>,
    ) -> WeaveResult<String> {
        let column = quote_column(&predicate.column);
        Ok(match &predicate.op {
            PredicateOp::Cmp { op, value } => {
                let idx = push_param(params, value.clone());
                format!("{column} {op} ${idx}")
            }
            PredicateOp::IsNull => format!("{column} IS NULL"),
            PredicateOp::IsNotNull => format!("{column} IS NOT NULL"),
            PredicateOp::In { values, negated } => {
                let placeholders = values
                    .iter()
                    .map(|v| format!("${}", push_param(params, v.clone())))
                    .collect::<Vec<_>>()
                    .join(", ");
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{column} {op} ({placeholders})")
            }
            PredicateOp::Between { lo, hi } => {
                let lo_idx = push_param(params, lo.clone());
                let hi_idx = push_param(params, hi.clone());
                format!("{column} BETWEEN ${lo_idx} AND ${hi_idx}")
            }
            PredicateOp::InSubquery(inner) => {
                let (inner_sql, inner_params) = inner.to_sql_params()?;
                let shifted = shift_placeholders(&inner_sql, params.len());
                params.extend(inner_params);
                format!("{column} IN ({shifted})")
            }
            PredicateOp::ConstFalse => "1=0".to_string(),
            PredicateOp::ConstTrue => "1=1".to_string(),
        })
    }

    // ==================== Mutations ====================

    fn mutation_table(&self, op: &str) -> WeaveResult<String> {
        match &self.source {
            Source::Table(table) => Ok(quote_ident(table)),
            Source::Subquery { .. } => Err(WeaveError::configuration(format!(
                "{op} requires a base table, not a subquery source"
            ))),
        }
    }

    fn render_insert(
        &self,
        rows: &[Vec<(String, Value)>],
        params: &mut Vec<Value>,
    ) -> WeaveResult<String> {
        let table = self.mutation_table("INSERT")?;

        // Columns come from the first row; later rows are looked up by name.
        let columns: Vec<&str> = rows[0].iter().map(|(c, _)| c.as_str()).collect();
        let column_list = columns
            .iter()
            .map(|c| quote_column(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let placeholders = columns
                .iter()
                .map(|col| {
                    let value = row
                        .iter()
                        .find(|(c, _)| c == col)
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null);
                    format!("${}", push_param(params, value))
                })
                .collect::<Vec<_>>()
                .join(", ");
            tuples.push(format!("({placeholders})"));
        }

        let mut sql = format!(
            "INSERT INTO {table} ({column_list}) VALUES {}",
            tuples.join(", ")
        );

        if let Some(conflict) = &self.on_conflict {
            let targets = conflict
                .columns
                .iter()
                .map(|c| quote_column(c))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ON CONFLICT ({targets})"));
            match &conflict.action {
                ConflictAction::DoNothing => sql.push_str(" DO NOTHING"),
                ConflictAction::DoUpdate(assignments) => {
                    sql.push_str(" DO UPDATE SET ");
                    sql.push_str(&render_assignments(assignments, params));
                }
            }
        }

        sql.push_str(&self.render_returning());
        Ok(sql)
    }

    fn render_update(
        &self,
        assignments: &[(String, Value)],
        params: &mut Vec<Value>,
    ) -> WeaveResult<String> {
        let table = self.mutation_table("UPDATE")?;
        let mut sql = format!("UPDATE {table} SET {}", render_assignments(assignments, params));
        sql.push_str(&self.render_where(params, true)?);
        sql.push_str(&self.render_returning());
        Ok(sql)
    }

    fn render_delete(&self, params: &mut Vec<Value>) -> WeaveResult<String> {
        let table = self.mutation_table("DELETE")?;
        // Hard delete: the soft-delete overlay is deliberately not applied.
        let mut sql = format!("DELETE FROM {table}");
        sql.push_str(&self.render_where(params, false)?);
        sql.push_str(&self.render_returning());
        Ok(sql)
    }

    fn render_returning(&self) -> String {
        match &self.returning {
            Returning::Default => " RETURNING *".to_string(),
            Returning::Suppressed => String::new(),
            Returning::Columns(columns) => format!(
                " RETURNING {}",
                columns
                    .iter()
                    .map(|c| quote_column(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

fn render_assignments(assignments: &[(String, Value)], params: &mut Vec<Value>) -> String {
    assignments
        .iter()
        .map(|(column, value)| {
            let idx = push_param(params, value.clone());
            format!("{} = ${idx}", quote_column(column))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_param(params: &mut Vec<Value>, value: Value) -> usize {
    params.push(value);
    params.len()
}

fn order_sql(order: super::Order) -> &'static str {
    match order {
        super::Order::Asc => "ASC",
        super::Order::Desc => "DESC",
    }
}

fn join_sql(kind: JoinKind) -> &'static str {
    match kind {
        JoinKind::Inner => "INNER JOIN",
        JoinKind::Left => "LEFT JOIN",
        JoinKind::Right => "RIGHT JOIN",
        JoinKind::Full => "FULL OUTER JOIN",
    }
}

/// Rewrite every `$n` placeholder to `$(n + offset)`.
///
/// With offset 3, `$1 AND $2` becomes `$4 AND $5`. This is the rebasing
/// step for subqueries and raw HAVING fragments, whose placeholders are
/// numbered from `$1` in isolation.
pub(crate) fn shift_placeholders(sql: &str, offset: usize) -> String {
    if offset == 0 {
        return sql.to_string();
    }

    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            let mut digits = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_digit() {
                    digits.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            result.push('$');
            match digits.parse::<usize>() {
                Ok(n) => result.push_str(&(n + offset).to_string()),
                Err(_) => result.push_str(&digits),
            }
        } else {
            result.push(ch);
        }
    }

    result
}
