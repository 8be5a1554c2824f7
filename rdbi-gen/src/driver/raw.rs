//! Raw schema model produced by drivers
//!
//! Everything here is expressed in the database's own vocabulary: names and
//! types are exactly as the database reports them, and references between
//! objects are by name only. The linked model in [`crate::model`] is built
//! from this.

use serde::{Deserialize, Serialize};

/// All schema information a driver found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub schemas: Vec<RawSchema>,
}

/// A single named schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSchema {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub enums: Vec<RawEnum>,
}

/// A table or view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    /// Columns in ordinal order
    #[serde(default)]
    pub columns: Vec<RawColumn>,
    #[serde(default)]
    pub indexes: Vec<RawIndex>,
    /// One row per column per foreign-key constraint
    #[serde(default)]
    pub foreign_keys: Vec<RawForeignKey>,
}

/// A column as reported by the database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    /// The database type, used as the type-map key
    pub data_type: String,
    #[serde(default)]
    pub is_array: bool,
    /// Non-zero if the type carries a length, e.g. `varchar(16)`
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub user_defined: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub is_primary_key: bool,
    /// Driver-specific row data, passed through to templates untouched
    #[serde(default)]
    pub orig: Orig,
}

/// An index row: column references are by DB name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIndex {
    pub name: String,
    #[serde(default)]
    pub is_unique: bool,
    pub columns: Vec<String>,
}

/// One column of a foreign-key constraint
///
/// A constraint spanning several columns is reported as several rows sharing
/// the same `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawForeignKey {
    /// Constraint name
    pub name: String,
    pub column_name: String,
    /// Schema of the referenced table; `None` means the owning table's schema
    #[serde(default)]
    pub ref_schema: Option<String>,
    pub ref_table: String,
    pub ref_column: String,
}

/// An enumerated type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEnum {
    pub name: String,
    /// Owning table for column-scoped enums (MySQL style)
    #[serde(default)]
    pub table: Option<String>,
    pub values: Vec<RawEnumValue>,
}

/// One label of an enum
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEnumValue {
    pub name: String,
    /// Declaration ordinal; not necessarily contiguous
    pub value: i64,
}

/// Opaque driver payload attached to a column.
///
/// The core never looks inside; it only serializes the payload into the data
/// handed to templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orig(serde_json::Value);

impl Orig {
    /// Capture any serializable driver row
    pub fn from_serialize<T: Serialize>(row: &T) -> crate::Result<Self> {
        Ok(Self(serde_json::to_value(row)?))
    }

    /// True when the driver attached nothing
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

impl SchemaInfo {
    /// Total number of tables across all schemas
    pub fn table_count(&self) -> usize {
        self.schemas.iter().map(|s| s.tables.len()).sum()
    }
}
