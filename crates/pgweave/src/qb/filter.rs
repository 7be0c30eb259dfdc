//! Filter operators and their desugaring into predicate IR.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::{WeaveError, WeaveResult};
use crate::qb::QueryBuilder;
use crate::qb::builder::{Connector, Predicate, PredicateOp};
use crate::value::Value;

/// A filter operator applied to one column.
///
/// The operator set is closed: rendering is a single match over these
/// variants. Plain values convert into [`Filter::Eq`] (`None` into
/// [`Filter::IsNull`]), so `("id", 1.into())` and `("id", Filter::eq(1))`
/// are equivalent.
#[derive(Clone)]
pub enum Filter {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Like(String),
    ILike(String),
    /// `IN (...)`; an empty list yields constant false.
    In(Vec<Value>),
    /// `NOT IN (...)`; an empty list yields constant true.
    NotIn(Vec<Value>),
    /// `BETWEEN lo AND hi`; exactly two bounds are required.
    Between(Vec<Value>),
    IsNull,
    /// `IN (subquery)`; owns the nested builder.
    Subquery(Box<QueryBuilder>),
}

impl Filter {
    pub fn eq(value: impl Into<Value>) -> Self {
        Filter::Eq(value.into())
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        Filter::Ne(value.into())
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Filter::Gt(value.into())
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Filter::Gte(value.into())
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Filter::Lt(value.into())
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Filter::Lte(value.into())
    }

    pub fn like(pattern: impl Into<String>) -> Self {
        Filter::Like(pattern.into())
    }

    pub fn ilike(pattern: impl Into<String>) -> Self {
        Filter::ILike(pattern.into())
    }

    pub fn in_list<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Filter::In(values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Filter::NotIn(values.into_iter().map(Into::into).collect())
    }

    pub fn between<I, T>(bounds: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Filter::Between(bounds.into_iter().map(Into::into).collect())
    }

    pub fn is_null() -> Self {
        Filter::IsNull
    }

    pub fn subquery(inner: QueryBuilder) -> Self {
        Filter::Subquery(Box::new(inner))
    }

    /// Desugar into a predicate carrying the caller's connector.
    pub(crate) fn into_predicate(
        self,
        connector: Connector,
        column: String,
    ) -> WeaveResult<Predicate> {
        let op = match self {
            Filter::Eq(Value::Null) | Filter::IsNull => PredicateOp::IsNull,
            Filter::Eq(v) => PredicateOp::Cmp { op: "=", value: v },
            Filter::Ne(v) => PredicateOp::Cmp { op: "!=", value: v },
            Filter::Gt(v) => PredicateOp::Cmp { op: ">", value: v },
            Filter::Gte(v) => PredicateOp::Cmp { op: ">=", value: v },
            Filter::Lt(v) => PredicateOp::Cmp { op: "<", value: v },
            Filter::Lte(v) => PredicateOp::Cmp { op: "<=", value: v },
            Filter::Like(p) => PredicateOp::Cmp {
                op: "LIKE",
                value: Value::Text(p),
            },
            Filter::ILike(p) => PredicateOp::Cmp {
                op: "ILIKE",
                value: Value::Text(p),
            },
            Filter::In(values) if values.is_empty() => PredicateOp::ConstFalse,
            Filter::In(values) => PredicateOp::In {
                values,
                negated: false,
            },
            Filter::NotIn(values) if values.is_empty() => PredicateOp::ConstTrue,
            Filter::NotIn(values) => PredicateOp::In {
                values,
                negated: true,
            },
            Filter::Between(bounds) => match <[Value; 2]>::try_from(bounds) {
                Ok([lo, hi]) => PredicateOp::Between { lo, hi },
                Err(bounds) => {
                    return Err(WeaveError::configuration(format!(
                        "BETWEEN on \"{column}\" requires exactly two bounds, got {}",
                        bounds.len()
                    )));
                }
            },
            Filter::Subquery(inner) => PredicateOp::InSubquery(inner),
        };

        Ok(Predicate {
            connector,
            column,
            op,
        })
    }
}

impl From<Value> for Filter {
    fn from(v: Value) -> Self {
        Filter::Eq(v)
    }
}

macro_rules! filter_from_scalar {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Filter {
                fn from(v: $ty) -> Self {
                    Filter::Eq(v.into())
                }
            }
        )+
    };
}

filter_from_scalar!(bool, i16, i32, i64, f32, f64, &str, String, Uuid, NaiveDateTime);

impl<T> From<Option<T>> for Filter
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => Filter::Eq(inner.into()),
            None => Filter::IsNull,
        }
    }
}
