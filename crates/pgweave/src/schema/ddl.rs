//! DDL rendering.
//!
//! Converts a [`TableSchema`] into `CREATE TABLE IF NOT EXISTS` statements
//! plus the small set of alter/drop operations the migration runner exposes.

use crate::error::WeaveResult;
use crate::ident::quote_ident;
use crate::schema::{ColumnDef, ColumnType, TableSchema};
use crate::value::quote_literal;

/// Render one column definition: quoted name, SQL type, PRIMARY KEY,
/// NOT NULL (when neither nullable nor primary key), enum CHECK, DEFAULT.
fn render_column(name: &str, def: &ColumnDef) -> WeaveResult<String> {
    let mut out = format!("{} {}", quote_ident(name), def.ty.sql_type()?);

    if def.primary_key {
        out.push_str(" PRIMARY KEY");
    } else if !def.nullable {
        out.push_str(" NOT NULL");
    }

    if let ColumnType::Enum(values) = &def.ty {
        let list = values
            .iter()
            .map(|v| quote_literal(v))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(" CHECK ({} IN ({}))", quote_ident(name), list));
    }

    if let Some(default) = &def.default {
        out.push_str(" DEFAULT ");
        out.push_str(&default.as_sql_literal()?);
    }

    Ok(out)
}

/// Render `CREATE TABLE IF NOT EXISTS` for a table schema.
pub fn create_table(name: &str, schema: &TableSchema) -> WeaveResult<String> {
    let columns = schema
        .iter()
        .map(|(col, def)| render_column(col, def))
        .collect::<WeaveResult<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(name),
        columns.join(", ")
    ))
}

/// Render `DROP TABLE IF EXISTS ... CASCADE`.
pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(name))
}

/// Render `ALTER TABLE ... ADD COLUMN`, reusing column-definition rendering.
pub fn add_column(table: &str, column: &str, def: &ColumnDef) -> WeaveResult<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        render_column(column, def)?
    ))
}

/// Render `ALTER TABLE ... DROP COLUMN`.
pub fn drop_column(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    )
}

/// Render `ALTER TABLE ... RENAME TO`.
pub fn rename_table(old: &str, new: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(old),
        quote_ident(new)
    )
}

/// Render `ALTER TABLE ... RENAME COLUMN ... TO`.
pub fn rename_column(table: &str, old: &str, new: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_ident(table),
        quote_ident(old),
        quote_ident(new)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType, TableSchema};

    #[test]
    fn create_table_renders_columns_in_order() {
        let schema = TableSchema::new()
            .column("id", ColumnDef::new(ColumnType::Int).primary_key())
            .column("email", ColumnDef::new(ColumnType::Text))
            .column("active", ColumnDef::new(ColumnType::Bool).default(true))
            .column("deleted_at", ColumnDef::new(ColumnType::Timestamp).nullable());

        let sql = create_table("users", &schema).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"users\" (\
             \"id\" INTEGER PRIMARY KEY, \
             \"email\" TEXT NOT NULL, \
             \"active\" BOOLEAN NOT NULL DEFAULT TRUE, \
             \"deleted_at\" TIMESTAMP)"
        );
    }

    #[test]
    fn enum_column_gets_check_constraint() {
        let schema = TableSchema::new().column(
            "status",
            ColumnDef::new(ColumnType::Enum(vec!["new".into(), "it's".into()])).default("new"),
        );
        let sql = create_table("orders", &schema).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"orders\" (\
             \"status\" TEXT NOT NULL CHECK (\"status\" IN ('new', 'it''s')) DEFAULT 'new')"
        );
    }

    #[test]
    fn array_column_renders_item_type() {
        let schema = TableSchema::new().column(
            "tags",
            ColumnDef::new(ColumnType::Array(Box::new(ColumnType::Text))),
        );
        let sql = create_table("posts", &schema).unwrap();
        assert!(sql.contains("\"tags\" TEXT[] NOT NULL"));
    }

    #[test]
    fn json_and_uuid_types() {
        let schema = TableSchema::new()
            .column("id", ColumnDef::new(ColumnType::Uuid).primary_key())
            .column("payload", ColumnDef::new(ColumnType::Json).nullable());
        let sql = create_table("events", &schema).unwrap();
        assert!(sql.contains("\"id\" UUID PRIMARY KEY"));
        assert!(sql.contains("\"payload\" JSONB"));
    }

    #[test]
    fn alter_operations() {
        assert_eq!(
            drop_table("users"),
            "DROP TABLE IF EXISTS \"users\" CASCADE"
        );
        assert_eq!(
            add_column("users", "age", &ColumnDef::new(ColumnType::Int).nullable()).unwrap(),
            "ALTER TABLE \"users\" ADD COLUMN \"age\" INTEGER"
        );
        assert_eq!(
            drop_column("users", "age"),
            "ALTER TABLE \"users\" DROP COLUMN \"age\""
        );
        assert_eq!(
            rename_table("users", "accounts"),
            "ALTER TABLE \"users\" RENAME TO \"accounts\""
        );
        assert_eq!(
            rename_column("users", "name", "full_name"),
            "ALTER TABLE \"users\" RENAME COLUMN \"name\" TO \"full_name\""
        );
    }
}
