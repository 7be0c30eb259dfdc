//! The query builder.
//!
//! A [`QueryBuilder`] is a mutable, chainable value accumulating an
//! operation kind and its clauses; the renderer converts the accumulated
//! intermediate representation into `$N`-parameterized SQL with a matching
//! argument vector. Parameter indices are computed at build time and
//! rebased across nested subqueries, so any nesting depth yields one
//! stable, contiguous placeholder sequence.

mod builder;
mod filter;
mod render;

pub use builder::{Assignments, JoinKind, OnConflictBuilder, Order, QueryBuilder};
pub use filter::Filter;

/// Build an ordered assignment list for `insert`/`update`.
///
/// ```ignore
/// let user = record! { "id" => 1, "name" => "Alice" };
/// db.query("users").insert(user).execute().await?;
/// ```
#[macro_export]
macro_rules! record {
    () => { Vec::<(String, $crate::Value)>::new() };
    ($($col:expr => $val:expr),+ $(,)?) => {
        vec![$(($col.to_string(), $crate::Value::from($val))),+]
    };
}
