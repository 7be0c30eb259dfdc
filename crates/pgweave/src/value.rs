//! Runtime parameter and result values.
//!
//! `Value` is the dynamic type that flows between the query builder and the
//! driver in both directions: builder-side as the `$N` parameter vector,
//! driver-side as decoded row cells. A custom enum instead of
//! `serde_json::Value` so that timestamps, UUIDs and arrays keep their
//! database types across the round trip.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::{WeaveError, WeaveResult};

/// A dynamically typed database value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),
    Uuid(Uuid),
    /// JSON/JSONB payload.
    Json(serde_json::Value),
    /// A PostgreSQL array; elements must share one scalar type.
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value as a SQL literal for DDL defaults.
    ///
    /// Only literals are accepted as column defaults: numbers bare, booleans
    /// as TRUE/FALSE, strings single-quoted with embedded quotes doubled,
    /// timestamps ISO-8601 single-quoted.
    pub(crate) fn as_sql_literal(&self) -> WeaveResult<String> {
        match self {
            Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Text(s) => Ok(quote_literal(s)),
            Value::Timestamp(ts) => Ok(quote_literal(
                &ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            )),
            other => Err(WeaveError::configuration(format!(
                "column default must be a literal (string, number, boolean or timestamp), got {other:?}"
            ))),
        }
    }
}

/// Single-quote a string literal, doubling embedded single quotes.
pub(crate) fn quote_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.naive_utc())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            // Narrow to the column's integer width; Postgres does not
            // coerce an INT8 binary payload into an INT4 column.
            Value::Int(v) if *ty == Type::INT2 => (*v as i16).to_sql(ty, out),
            Value::Int(v) if *ty == Type::INT4 => (*v as i32).to_sql(ty, out),
            Value::Int(v) => v.to_sql(ty, out),
            Value::Float(v) if *ty == Type::FLOAT4 => (*v as f32).to_sql(ty, out),
            Value::Float(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            Value::Array(items) => items.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The engine is dynamically typed: any mismatch surfaces as a
        // serialization error at bind time instead of an accepts() veto.
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_rendering() {
        assert_eq!(Value::Int(42).as_sql_literal().unwrap(), "42");
        assert_eq!(Value::Bool(true).as_sql_literal().unwrap(), "TRUE");
        assert_eq!(Value::Bool(false).as_sql_literal().unwrap(), "FALSE");
        assert_eq!(
            Value::Text("it's".to_string()).as_sql_literal().unwrap(),
            "'it''s'"
        );
    }

    #[test]
    fn timestamp_literal_is_iso8601() {
        let ts = NaiveDateTime::parse_from_str("2026-03-01 12:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(
            Value::Timestamp(ts).as_sql_literal().unwrap(),
            "'2026-03-01T12:30:00'"
        );
    }

    #[test]
    fn non_literal_defaults_are_rejected() {
        assert!(Value::Null.as_sql_literal().is_err());
        assert!(Value::Json(serde_json::json!({})).as_sql_literal().is_err());
        assert!(Value::Array(vec![]).as_sql_literal().is_err());
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(Option::<i32>::None), Value::Null);
        assert_eq!(Value::from(Some(7i32)), Value::Int(7));
    }
}
