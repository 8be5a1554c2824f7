//! Linked schema model
//!
//! Tables, enums and foreign keys live in flat arenas on [`DbData`] and refer
//! to each other by id. Foreign keys are owned by the declaring table; the
//! referenced table and columns only hold ids pointing back at them.

use std::collections::HashMap;

use crate::driver::Orig;

/// Index of a schema in [`DbData::schemas`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub usize);

/// Index of a table in [`DbData::tables`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub usize);

/// Index of an enum in [`DbData::enums`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub usize);

/// Index of a foreign key in [`DbData::foreign_keys`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignKeyId(pub usize);

/// A column, addressed by its table and ordinal position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId {
    pub table: TableId,
    pub index: usize,
}

/// One leaf of a foreign key, addressed by the key and position within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FkColumnId {
    pub fk: ForeignKeyId,
    pub position: usize,
}

/// The whole model for one run
#[derive(Debug, Clone, Default)]
pub struct DbData {
    pub schemas: Vec<Schema>,
    pub tables: Vec<Table>,
    pub enums: Vec<Enum>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    pub db_name: String,
    pub tables: Vec<TableId>,
    pub enums: Vec<EnumId>,
    pub(crate) table_index: HashMap<String, TableId>,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub db_name: String,
    pub schema: SchemaId,
    pub comment: String,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
    /// Positions in `columns` of primary-key columns, ascending
    pub primary_keys: Vec<usize>,
    pub indexes: Vec<Index>,
    /// Keys this table declares
    pub foreign_keys: Vec<ForeignKeyId>,
    /// Keys other tables declare that point at this one
    pub foreign_key_refs: Vec<ForeignKeyId>,
    pub(crate) column_index: HashMap<String, usize>,
    pub(crate) index_index: HashMap<String, usize>,
    pub(crate) fk_index: HashMap<String, ForeignKeyId>,
    pub(crate) fk_ref_index: HashMap<String, ForeignKeyId>,
}

#[derive(Debug, Clone, Default)]
pub struct Column {
    pub name: String,
    pub db_name: String,
    /// Mapped type; `None` when neither type map had an entry
    pub ty: Option<String>,
    pub db_type: String,
    pub is_array: bool,
    pub length: u32,
    pub user_defined: bool,
    pub nullable: bool,
    pub has_default: bool,
    pub comment: String,
    pub is_primary_key: bool,
    /// The foreign-key leaf this column participates in, if any
    pub fk_column: Option<FkColumnId>,
    /// Foreign-key leaves in other tables that reference this column
    pub fk_column_refs: Vec<FkColumnId>,
    pub orig: Orig,
}

#[derive(Debug, Clone, Default)]
pub struct Index {
    pub name: String,
    pub db_name: String,
    pub is_unique: bool,
    /// Positions in the owning table's `columns`
    pub columns: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub name: String,
    pub db_name: String,
    pub table: TableId,
    pub ref_table: TableId,
    pub columns: Vec<FkColumn>,
}

/// A single column pair within a foreign key
#[derive(Debug, Clone)]
pub struct FkColumn {
    pub column: ColumnId,
    pub ref_column: ColumnId,
    pub column_db_name: String,
    pub ref_column_db_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Enum {
    pub name: String,
    pub db_name: String,
    pub schema: SchemaId,
    /// Owning table for column-scoped enums
    pub table: Option<TableId>,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Default)]
pub struct EnumValue {
    pub name: String,
    pub db_name: String,
    pub value: i64,
}

impl DbData {
    pub fn schema(&self, id: SchemaId) -> &Schema {
        &self.schemas[id.0]
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn enum_(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn foreign_key(&self, id: ForeignKeyId) -> &ForeignKey {
        &self.foreign_keys[id.0]
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        &self.tables[id.table.0].columns[id.index]
    }

    pub fn fk_column(&self, id: FkColumnId) -> &FkColumn {
        &self.foreign_keys[id.fk.0].columns[id.position]
    }

    pub(crate) fn column_mut(&mut self, id: ColumnId) -> &mut Column {
        &mut self.tables[id.table.0].columns[id.index]
    }

    /// Schema ids in configured order
    pub fn schema_ids(&self) -> impl Iterator<Item = SchemaId> {
        (0..self.schemas.len()).map(SchemaId)
    }

    /// Find a schema by database name
    pub fn find_schema(&self, db_name: &str) -> Option<SchemaId> {
        self.schemas
            .iter()
            .position(|s| s.db_name == db_name)
            .map(SchemaId)
    }

    /// Find a table by schema and table database names
    pub fn find_table(&self, schema: &str, table: &str) -> Option<TableId> {
        self.find_schema(schema)
            .and_then(|id| self.schema(id).table_by_db_name(table))
    }
}

impl Schema {
    pub fn table_by_db_name(&self, db_name: &str) -> Option<TableId> {
        self.table_index.get(db_name).copied()
    }
}

impl Table {
    pub fn column_by_db_name(&self, db_name: &str) -> Option<&Column> {
        self.column_index.get(db_name).map(|&i| &self.columns[i])
    }

    pub(crate) fn column_position(&self, db_name: &str) -> Option<usize> {
        self.column_index.get(db_name).copied()
    }

    pub fn index_by_db_name(&self, db_name: &str) -> Option<&Index> {
        self.index_index.get(db_name).map(|&i| &self.indexes[i])
    }

    pub fn foreign_key_by_db_name(&self, db_name: &str) -> Option<ForeignKeyId> {
        self.fk_index.get(db_name).copied()
    }

    pub fn foreign_key_ref_by_db_name(&self, db_name: &str) -> Option<ForeignKeyId> {
        self.fk_ref_index.get(db_name).copied()
    }

    /// Primary-key columns in ordinal order
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_keys.iter().map(|&i| &self.columns[i])
    }
}

impl Column {
    /// The mapped type, or "" when unmapped
    pub fn type_name(&self) -> &str {
        self.ty.as_deref().unwrap_or_default()
    }

    pub fn is_fk(&self) -> bool {
        self.fk_column.is_some()
    }

    pub fn has_fk_ref(&self) -> bool {
        !self.fk_column_refs.is_empty()
    }
}
