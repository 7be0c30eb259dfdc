//! # pgweave
//!
//! A runtime-schema PostgreSQL query builder and migration engine.
//!
//! Tables are declared as plain data: no code generation, no declarative
//! schema file. A [`Database`] handle hands out chainable builders that
//! render `$N`-parameterized SQL with a matching argument vector and
//! execute through a pluggable [`Driver`](driver::Driver).
//!
//! ```ignore
//! use pgweave::{Database, Filter, Order, record};
//! use pgweave::driver::PgDriver;
//! use pgweave::schema::{ColumnDef, ColumnType, DatabaseSchema, TableSchema};
//! use std::sync::Arc;
//!
//! let schema = DatabaseSchema::new().table(
//!     "users",
//!     TableSchema::new()
//!         .column("id", ColumnDef::new(ColumnType::Int).primary_key())
//!         .column("name", ColumnDef::new(ColumnType::Text)),
//! );
//!
//! let driver = Arc::new(PgDriver::connect("postgres://localhost/app").await?);
//! let db = Database::new(schema, driver)?;
//! db.create_tables().await?;
//!
//! db.query("users")
//!     .insert(record! { "id" => 1, "name" => "Alice" })
//!     .execute()
//!     .await?;
//!
//! let adults = db
//!     .query("users")
//!     .filter([("age", Filter::gt(18))])
//!     .order_by("name", Order::Asc)
//!     .execute()
//!     .await?;
//! ```

pub mod db;
pub mod driver;
pub mod error;
pub mod logger;
pub mod migrate;
pub mod qb;
pub mod schema;
pub mod soft_delete;
pub mod value;

mod ident;

pub use db::Database;
pub use driver::{ExecResult, Row};
pub use error::{WeaveError, WeaveResult};
pub use logger::{QueryLogger, TracingLogger};
pub use qb::{Assignments, Filter, JoinKind, Order, QueryBuilder};
pub use soft_delete::{SoftDeleteConfig, SoftDeleteScope};
pub use value::Value;
