//! Runtime schema model.
//!
//! Tables are declared as plain data: an ordered mapping from column name to
//! [`ColumnDef`]. Column insertion order determines DDL column order. The
//! schema is created once at startup, validated, and stays immutable for the
//! life of the [`Database`](crate::Database) handle.

pub mod ddl;

use indexmap::IndexMap;

use crate::error::{WeaveError, WeaveResult};
use crate::value::Value;

/// A column type descriptor.
///
/// Each case maps to exactly one PostgreSQL type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// INTEGER
    Int,
    /// TEXT
    Text,
    /// BOOLEAN
    Bool,
    /// TIMESTAMP
    Timestamp,
    /// UUID
    Uuid,
    /// JSONB
    Json,
    /// TEXT with a CHECK constraint over the allowed values
    Enum(Vec<String>),
    /// `T[]`; the item type is restricted to the scalar cases
    Array(Box<ColumnType>),
}

impl ColumnType {
    /// The mapped SQL type name.
    pub(crate) fn sql_type(&self) -> WeaveResult<String> {
        match self {
            ColumnType::Int => Ok("INTEGER".to_string()),
            ColumnType::Text | ColumnType::Enum(_) => Ok("TEXT".to_string()),
            ColumnType::Bool => Ok("BOOLEAN".to_string()),
            ColumnType::Timestamp => Ok("TIMESTAMP".to_string()),
            ColumnType::Uuid => Ok("UUID".to_string()),
            ColumnType::Json => Ok("JSONB".to_string()),
            ColumnType::Array(item) => {
                if !item.is_scalar() {
                    return Err(WeaveError::configuration(
                        "array item type must be a primitive scalar",
                    ));
                }
                Ok(format!("{}[]", item.sql_type()?))
            }
        }
    }

    fn is_scalar(&self) -> bool {
        matches!(
            self,
            ColumnType::Int
                | ColumnType::Text
                | ColumnType::Bool
                | ColumnType::Timestamp
                | ColumnType::Uuid
        )
    }

    fn validate(&self) -> WeaveResult<()> {
        match self {
            ColumnType::Enum(values) => {
                if values.is_empty() {
                    return Err(WeaveError::configuration("enum column has no allowed values"));
                }
                Ok(())
            }
            ColumnType::Array(item) => {
                if !item.is_scalar() {
                    return Err(WeaveError::configuration(
                        "array item type must be a primitive scalar",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A column definition: type plus attributes.
///
/// A primary key implies NOT NULL; a default must be representable as a SQL
/// literal and, for enum columns, belong to the allowed-values set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(ty: ColumnType) -> Self {
        Self {
            ty,
            nullable: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn validate(&self, table: &str, column: &str) -> WeaveResult<()> {
        let at = |e: WeaveError| {
            WeaveError::configuration(format!("column \"{table}\".\"{column}\": {e}"))
        };

        self.ty.validate().map_err(at)?;

        if self.primary_key && self.nullable {
            return Err(WeaveError::configuration(format!(
                "column \"{table}\".\"{column}\": a primary key cannot be nullable"
            )));
        }

        if let Some(default) = &self.default {
            default.as_sql_literal().map_err(at)?;
            if let ColumnType::Enum(allowed) = &self.ty {
                match default {
                    Value::Text(s) if allowed.contains(s) => {}
                    other => {
                        return Err(WeaveError::configuration(format!(
                            "column \"{table}\".\"{column}\": enum default {other:?} is not in the allowed set"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// An ordered mapping from column name to definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    columns: IndexMap<String, ColumnDef>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Insertion order determines DDL column order.
    pub fn column(mut self, name: impl Into<String>, def: ColumnDef) -> Self {
        self.columns.insert(name.into(), def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnDef)> {
        self.columns.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn validate(&self, table: &str) -> WeaveResult<()> {
        if self.columns.is_empty() {
            return Err(WeaveError::configuration(format!(
                "table \"{table}\" has no columns"
            )));
        }
        for (name, def) in &self.columns {
            if name.is_empty() {
                return Err(WeaveError::configuration(format!(
                    "table \"{table}\" has an empty column name"
                )));
            }
            def.validate(table, name)?;
        }
        Ok(())
    }
}

/// The full database schema: table name to table schema, in declaration
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
    tables: IndexMap<String, TableSchema>,
}

impl DatabaseSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: impl Into<String>, schema: TableSchema) -> Self {
        self.tables.insert(name.into(), schema);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableSchema)> {
        self.tables.iter()
    }

    /// Run all schema invariants; called by the handle at construction.
    pub fn validate(&self) -> WeaveResult<()> {
        for (name, table) in &self.tables {
            if name.is_empty() {
                return Err(WeaveError::configuration("empty table name"));
            }
            table.validate(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSchema {
        TableSchema::new()
            .column("id", ColumnDef::new(ColumnType::Int).primary_key())
            .column("name", ColumnDef::new(ColumnType::Text))
    }

    #[test]
    fn valid_schema_passes() {
        let schema = DatabaseSchema::new().table("users", users());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn empty_enum_is_rejected() {
        let schema = DatabaseSchema::new().table(
            "t",
            TableSchema::new().column("status", ColumnDef::new(ColumnType::Enum(vec![]))),
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn array_of_array_is_rejected() {
        let nested = ColumnType::Array(Box::new(ColumnType::Array(Box::new(ColumnType::Int))));
        let schema = DatabaseSchema::new()
            .table("t", TableSchema::new().column("grid", ColumnDef::new(nested)));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn array_of_json_is_rejected() {
        let ty = ColumnType::Array(Box::new(ColumnType::Json));
        let schema =
            DatabaseSchema::new().table("t", TableSchema::new().column("blobs", ColumnDef::new(ty)));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn nullable_primary_key_is_rejected() {
        let schema = DatabaseSchema::new().table(
            "t",
            TableSchema::new().column(
                "id",
                ColumnDef::new(ColumnType::Int).primary_key().nullable(),
            ),
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn enum_default_must_be_allowed() {
        let ty = ColumnType::Enum(vec!["draft".into(), "sent".into()]);
        let bad = DatabaseSchema::new().table(
            "t",
            TableSchema::new().column("status", ColumnDef::new(ty.clone()).default("deleted")),
        );
        assert!(bad.validate().is_err());

        let ok = DatabaseSchema::new().table(
            "t",
            TableSchema::new().column("status", ColumnDef::new(ty).default("draft")),
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn non_literal_default_is_rejected() {
        let schema = DatabaseSchema::new().table(
            "t",
            TableSchema::new().column(
                "meta",
                ColumnDef::new(ColumnType::Json).default(serde_json::json!({"a": 1})),
            ),
        );
        assert!(schema.validate().is_err());
    }
}
