//! PostgreSQL driver on top of tokio-postgres.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{TryStreamExt, pin_mut};
use tokio_postgres::NoTls;
use tokio_postgres::types::{FromSql, Kind, ToSql, Type};

use crate::driver::{Driver, ExecResult, Row};
use crate::error::{WeaveError, WeaveResult};
use crate::value::Value;

/// A driver that owns one PostgreSQL connection.
///
/// Transactions are plain `BEGIN`/`COMMIT`/`ROLLBACK` statements on the same
/// connection; [`begin`](Driver::begin) hands back a transaction-bound clone
/// sharing it. Statements within a transaction are therefore serialised by
/// the connection itself.
pub struct PgDriver {
    client: Arc<tokio_postgres::Client>,
    in_tx: bool,
}

impl PgDriver {
    /// Connect to a PostgreSQL database.
    ///
    /// The connection task is driven in the background; it logs and stops on
    /// error, after which every statement fails with a driver error.
    pub async fn connect(url: &str) -> WeaveResult<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection terminated");
            }
        });
        Ok(Self {
            client: Arc::new(client),
            in_tx: false,
        })
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn exec(&self, sql: &str, params: &[Value]) -> WeaveResult<ExecResult> {
        let refs = params.iter().map(|p| p as &dyn ToSql);
        let stream = self.client.query_raw(sql, refs).await?;
        pin_mut!(stream);

        let mut rows = Vec::new();
        while let Some(row) = stream.try_next().await? {
            rows.push(decode_row(&row)?);
        }
        // Mutations report their affected count; plain SELECTs report the
        // number of rows fetched.
        let row_count = stream.rows_affected().unwrap_or(rows.len() as u64);

        Ok(ExecResult { rows, row_count })
    }

    async fn begin(&self) -> WeaveResult<Arc<dyn Driver>> {
        if self.in_tx {
            return Err(WeaveError::driver(
                "a transaction is already open on this connection",
            ));
        }
        self.client.batch_execute("BEGIN").await?;
        Ok(Arc::new(PgDriver {
            client: self.client.clone(),
            in_tx: true,
        }))
    }

    async fn commit(&self) -> WeaveResult<()> {
        if !self.in_tx {
            return Err(WeaveError::driver("commit outside a transaction"));
        }
        Ok(self.client.batch_execute("COMMIT").await?)
    }

    async fn rollback(&self) -> WeaveResult<()> {
        if !self.in_tx {
            return Err(WeaveError::driver("rollback outside a transaction"));
        }
        Ok(self.client.batch_execute("ROLLBACK").await?)
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    async fn close(&self) -> WeaveResult<()> {
        // tokio-postgres closes the connection when the last Client handle
        // drops; nothing to flush here.
        Ok(())
    }
}

fn decode_row(row: &tokio_postgres::Row) -> WeaveResult<Row> {
    let mut out = Row::with_capacity(row.columns().len());
    for (idx, col) in row.columns().iter().enumerate() {
        out.insert(col.name().to_string(), decode_value(row, idx, col.type_())?);
    }
    Ok(out)
}

fn decode_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> WeaveResult<Value> {
    if let Kind::Array(member) = ty.kind() {
        return decode_array(row, idx, member);
    }

    let value = match ty.name() {
        "bool" => cell(row, idx, Value::Bool)?,
        "int2" => cell(row, idx, |v: i16| Value::Int(v as i64))?,
        "int4" => cell(row, idx, |v: i32| Value::Int(v as i64))?,
        "int8" => cell(row, idx, Value::Int)?,
        "float4" => cell(row, idx, |v: f32| Value::Float(v as f64))?,
        "float8" => cell(row, idx, Value::Float)?,
        "text" | "varchar" | "bpchar" | "name" => cell(row, idx, Value::Text)?,
        "timestamp" => cell(row, idx, Value::Timestamp)?,
        "timestamptz" => cell(row, idx, |v: chrono::DateTime<chrono::Utc>| {
            Value::Timestamp(v.naive_utc())
        })?,
        "uuid" => cell(row, idx, Value::Uuid)?,
        "json" | "jsonb" => cell(row, idx, Value::Json)?,
        // Anything outside the schema model: best-effort text, else NULL.
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map(|v| v.map(Value::Text).unwrap_or(Value::Null))
            .unwrap_or(Value::Null),
    };
    Ok(value)
}

fn cell<'a, T, F>(row: &'a tokio_postgres::Row, idx: usize, wrap: F) -> WeaveResult<Value>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Value,
{
    Ok(row
        .try_get::<_, Option<T>>(idx)
        .map_err(WeaveError::from)?
        .map(wrap)
        .unwrap_or(Value::Null))
}

fn decode_array(row: &tokio_postgres::Row, idx: usize, member: &Type) -> WeaveResult<Value> {
    match member.name() {
        "bool" => array_cell(row, idx, Value::Bool),
        "int2" => array_cell(row, idx, |v: i16| Value::Int(v as i64)),
        "int4" => array_cell(row, idx, |v: i32| Value::Int(v as i64)),
        "int8" => array_cell(row, idx, Value::Int),
        "float4" => array_cell(row, idx, |v: f32| Value::Float(v as f64)),
        "float8" => array_cell(row, idx, Value::Float),
        "timestamp" => array_cell(row, idx, Value::Timestamp),
        "uuid" => array_cell(row, idx, Value::Uuid),
        _ => array_cell(row, idx, Value::Text),
    }
}

fn array_cell<'a, T, F>(row: &'a tokio_postgres::Row, idx: usize, wrap: F) -> WeaveResult<Value>
where
    T: FromSql<'a>,
    F: Fn(T) -> Value,
{
    Ok(row
        .try_get::<_, Option<Vec<Option<T>>>>(idx)
        .map_err(WeaveError::from)?
        .map(|items| {
            Value::Array(
                items
                    .into_iter()
                    .map(|item| item.map(&wrap).unwrap_or(Value::Null))
                    .collect(),
            )
        })
        .unwrap_or(Value::Null))
}
