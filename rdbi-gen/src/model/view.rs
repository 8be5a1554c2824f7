//! Serializable views of the model, as seen by templates and the external engine
//!
//! Views borrow from [`DbData`] and resolve ids into nested values. Foreign-key
//! leaves are flattened to names so that the output is a tree.

use serde::Serialize;

use super::data::*;
use crate::driver::Orig;

#[derive(Debug, Serialize)]
pub struct DbView<'a> {
    pub schemas: Vec<SchemaView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SchemaView<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    pub tables: Vec<TableView<'a>>,
    pub enums: Vec<EnumView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TableView<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    pub schema_name: &'a str,
    pub schema_db_name: &'a str,
    pub comment: &'a str,
    pub columns: Vec<ColumnView<'a>>,
    pub primary_keys: Vec<ColumnView<'a>>,
    pub indexes: Vec<IndexView<'a>>,
    pub foreign_keys: Vec<ForeignKeyView<'a>>,
    pub foreign_key_refs: Vec<ForeignKeyView<'a>>,
    pub has_primary_key: bool,
    pub has_foreign_keys: bool,
    pub has_foreign_key_refs: bool,
}

#[derive(Debug, Serialize)]
pub struct ColumnView<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    /// Mapped type, "" when unmapped
    #[serde(rename = "type")]
    pub ty: &'a str,
    pub type_mapped: bool,
    pub db_type: &'a str,
    pub is_array: bool,
    pub length: u32,
    pub user_defined: bool,
    pub nullable: bool,
    pub has_default: bool,
    pub comment: &'a str,
    pub is_primary_key: bool,
    pub is_fk: bool,
    pub has_fk_ref: bool,
    pub fk_column: Option<FkColumnView<'a>>,
    pub fk_column_refs: Vec<FkColumnView<'a>>,
    pub orig: &'a Orig,
}

#[derive(Debug, Serialize)]
pub struct IndexView<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    pub is_unique: bool,
    pub columns: Vec<ColumnView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ForeignKeyView<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    pub table_name: &'a str,
    pub table_db_name: &'a str,
    pub ref_table_name: &'a str,
    pub ref_table_db_name: &'a str,
    pub fk_columns: Vec<FkColumnView<'a>>,
}

/// One column pair of a foreign key, by name only
#[derive(Debug, Serialize)]
pub struct FkColumnView<'a> {
    /// Constraint name
    pub name: &'a str,
    pub db_name: &'a str,
    pub column_name: &'a str,
    pub column_db_name: &'a str,
    pub ref_column_name: &'a str,
    pub ref_column_db_name: &'a str,
    pub table_name: &'a str,
    pub table_db_name: &'a str,
    pub ref_table_name: &'a str,
    pub ref_table_db_name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EnumView<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    pub schema_name: &'a str,
    /// Owning table, "" for schema-level enums
    pub table_db_name: &'a str,
    pub values: Vec<EnumValueView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct EnumValueView<'a> {
    pub name: &'a str,
    pub db_name: &'a str,
    pub value: i64,
}

impl DbData {
    pub fn view(&self) -> DbView<'_> {
        DbView {
            schemas: self.schema_ids().map(|id| self.schema_view(id)).collect(),
        }
    }

    pub fn schema_view(&self, id: SchemaId) -> SchemaView<'_> {
        let schema = self.schema(id);
        SchemaView {
            name: &schema.name,
            db_name: &schema.db_name,
            tables: schema.tables.iter().map(|&t| self.table_view(t)).collect(),
            enums: schema.enums.iter().map(|&e| self.enum_view(e)).collect(),
        }
    }

    pub fn table_view(&self, id: TableId) -> TableView<'_> {
        let table = self.table(id);
        let schema = self.schema(table.schema);
        let column = |index: usize| self.column_view(ColumnId { table: id, index });

        TableView {
            name: &table.name,
            db_name: &table.db_name,
            schema_name: &schema.name,
            schema_db_name: &schema.db_name,
            comment: &table.comment,
            columns: (0..table.columns.len()).map(column).collect(),
            primary_keys: table.primary_keys.iter().map(|&i| column(i)).collect(),
            indexes: table
                .indexes
                .iter()
                .map(|index| IndexView {
                    name: &index.name,
                    db_name: &index.db_name,
                    is_unique: index.is_unique,
                    columns: index.columns.iter().map(|&i| column(i)).collect(),
                })
                .collect(),
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|&fk| self.foreign_key_view(fk))
                .collect(),
            foreign_key_refs: table
                .foreign_key_refs
                .iter()
                .map(|&fk| self.foreign_key_view(fk))
                .collect(),
            has_primary_key: !table.primary_keys.is_empty(),
            has_foreign_keys: !table.foreign_keys.is_empty(),
            has_foreign_key_refs: !table.foreign_key_refs.is_empty(),
        }
    }

    pub fn column_view(&self, id: ColumnId) -> ColumnView<'_> {
        let col = self.column(id);
        ColumnView {
            name: &col.name,
            db_name: &col.db_name,
            ty: col.type_name(),
            type_mapped: col.ty.is_some(),
            db_type: &col.db_type,
            is_array: col.is_array,
            length: col.length,
            user_defined: col.user_defined,
            nullable: col.nullable,
            has_default: col.has_default,
            comment: &col.comment,
            is_primary_key: col.is_primary_key,
            is_fk: col.is_fk(),
            has_fk_ref: col.has_fk_ref(),
            fk_column: col.fk_column.map(|leaf| self.fk_column_view(leaf)),
            fk_column_refs: col
                .fk_column_refs
                .iter()
                .map(|&leaf| self.fk_column_view(leaf))
                .collect(),
            orig: &col.orig,
        }
    }

    pub fn foreign_key_view(&self, id: ForeignKeyId) -> ForeignKeyView<'_> {
        let fk = self.foreign_key(id);
        let table = self.table(fk.table);
        let ref_table = self.table(fk.ref_table);
        ForeignKeyView {
            name: &fk.name,
            db_name: &fk.db_name,
            table_name: &table.name,
            table_db_name: &table.db_name,
            ref_table_name: &ref_table.name,
            ref_table_db_name: &ref_table.db_name,
            fk_columns: (0..fk.columns.len())
                .map(|position| self.fk_column_view(FkColumnId { fk: id, position }))
                .collect(),
        }
    }

    pub fn fk_column_view(&self, id: FkColumnId) -> FkColumnView<'_> {
        let fk = self.foreign_key(id.fk);
        let leaf = self.fk_column(id);
        let table = self.table(fk.table);
        let ref_table = self.table(fk.ref_table);
        FkColumnView {
            name: &fk.name,
            db_name: &fk.db_name,
            column_name: &self.column(leaf.column).name,
            column_db_name: &leaf.column_db_name,
            ref_column_name: &self.column(leaf.ref_column).name,
            ref_column_db_name: &leaf.ref_column_db_name,
            table_name: &table.name,
            table_db_name: &table.db_name,
            ref_table_name: &ref_table.name,
            ref_table_db_name: &ref_table.db_name,
        }
    }

    pub fn enum_view(&self, id: EnumId) -> EnumView<'_> {
        let item = self.enum_(id);
        EnumView {
            name: &item.name,
            db_name: &item.db_name,
            schema_name: &self.schema(item.schema).name,
            table_db_name: item
                .table
                .map(|t| self.table(t).db_name.as_str())
                .unwrap_or_default(),
            values: item
                .values
                .iter()
                .map(|v| EnumValueView {
                    name: &v.name,
                    db_name: &v.db_name,
                    value: v.value,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::driver::{RawColumn, RawForeignKey, RawSchema, RawTable, SchemaInfo};
    use crate::model::{build_data, NameConverter, TableId, TypeMapper};

    fn data() -> crate::model::DbData {
        let column = |name: &str, pk: bool| RawColumn {
            name: name.into(),
            data_type: "bigint".into(),
            is_primary_key: pk,
            ..Default::default()
        };
        let info = SchemaInfo {
            schemas: vec![RawSchema {
                name: "public".into(),
                tables: vec![
                    RawTable {
                        name: "users".into(),
                        columns: vec![column("id", true)],
                        ..Default::default()
                    },
                    RawTable {
                        name: "orders".into(),
                        columns: vec![column("id", true), column("user_id", false)],
                        foreign_keys: vec![RawForeignKey {
                            name: "fk_user".into(),
                            column_name: "user_id".into(),
                            ref_schema: None,
                            ref_table: "users".into(),
                            ref_column: "id".into(),
                        }],
                        ..Default::default()
                    },
                ],
                enums: vec![],
            }],
        };
        let names = NameConverter::new("{{ name | pascal }}").unwrap();
        build_data(&info, &names, &TypeMapper::default()).unwrap()
    }

    #[test]
    fn test_column_view_fields() {
        let data = data();
        let value = serde_json::to_value(data.table_view(TableId(1))).unwrap();
        let user_id = &value["columns"][1];

        assert_eq!(user_id["name"], "UserId");
        assert_eq!(user_id["type"], "");
        assert_eq!(user_id["type_mapped"], false);
        assert_eq!(user_id["is_fk"], true);
        assert_eq!(user_id["fk_column"]["ref_table_db_name"], "users");
        assert_eq!(user_id["fk_column"]["ref_column_name"], "Id");
        assert_eq!(user_id["orig"], json!(null));
        assert_eq!(value["has_foreign_keys"], true);
        assert_eq!(value["has_foreign_key_refs"], false);
        assert_eq!(value["primary_keys"][0]["db_name"], "id");
    }

    #[test]
    fn test_referenced_table_view() {
        let data = data();
        let value = serde_json::to_value(data.table_view(TableId(0))).unwrap();
        assert_eq!(value["foreign_key_refs"][0]["db_name"], "fk_user");
        assert_eq!(value["foreign_key_refs"][0]["table_name"], "Orders");
        assert_eq!(
            value["columns"][0]["fk_column_refs"][0]["column_db_name"],
            "user_id"
        );
    }

    #[test]
    fn test_db_view_nests_schemas() {
        let data = data();
        let value = serde_json::to_value(data.view()).unwrap();
        assert_eq!(value["schemas"][0]["name"], "Public");
        assert_eq!(value["schemas"][0]["tables"].as_array().unwrap().len(), 2);
    }
}
