//! Model assembly: raw driver output to the linked, converted model

mod convert;
mod data;
mod linker;
pub mod view;

pub use convert::{NameConverter, TypeMapper};
pub use data::*;
pub use linker::CrossReferenceBuilder;

use tracing::{info, warn};

use crate::driver::{RawColumn, RawEnum, RawTable, SchemaInfo};
use crate::error::{GenError, Result};

/// Build the full model for one run.
///
/// Every name goes through `names`; every column type through `types`.
/// Fails on a name conversion error or a table name repeated within a schema.
pub fn build_data(
    info: &SchemaInfo,
    names: &NameConverter,
    types: &TypeMapper,
) -> Result<DbData> {
    let mut data = DbData::default();
    let mut raw_tables: Vec<(TableId, &RawTable)> = Vec::new();

    for raw_schema in &info.schemas {
        let schema_id = SchemaId(data.schemas.len());
        let mut schema = Schema {
            name: names.convert(&raw_schema.name)?,
            db_name: raw_schema.name.clone(),
            ..Default::default()
        };

        for raw_table in &raw_schema.tables {
            if schema.table_index.contains_key(&raw_table.name) {
                return Err(GenError::DuplicateTable {
                    schema: raw_schema.name.clone(),
                    table: raw_table.name.clone(),
                });
            }
            let table_id = TableId(data.tables.len());
            let table = build_table(raw_table, schema_id, names, types)
                .map_err(|e| e.context(format!("table {}.{}", raw_schema.name, raw_table.name)))?;
            schema.table_index.insert(raw_table.name.clone(), table_id);
            schema.tables.push(table_id);
            data.tables.push(table);
            raw_tables.push((table_id, raw_table));
        }

        for raw_enum in &raw_schema.enums {
            let enum_id = EnumId(data.enums.len());
            let item = build_enum(raw_enum, schema_id, &schema, names)
                .map_err(|e| e.context(format!("enum {}.{}", raw_schema.name, raw_enum.name)))?;
            data.enums.push(item);
            schema.enums.push(enum_id);
        }

        data.schemas.push(schema);
    }

    CrossReferenceBuilder::new(names).link(&mut data, &raw_tables)?;

    info!(
        "Built model: {} schemas, {} tables, {} enums, {} foreign keys",
        data.schemas.len(),
        data.tables.len(),
        data.enums.len(),
        data.foreign_keys.len()
    );
    Ok(data)
}

fn build_table(
    raw: &RawTable,
    schema: SchemaId,
    names: &NameConverter,
    types: &TypeMapper,
) -> Result<Table> {
    let mut table = Table {
        name: names.convert(&raw.name)?,
        db_name: raw.name.clone(),
        schema,
        comment: raw.comment.clone(),
        ..Default::default()
    };
    for (pos, raw_col) in raw.columns.iter().enumerate() {
        table
            .column_index
            .entry(raw_col.name.clone())
            .or_insert(pos);
        table.columns.push(build_column(raw_col, names, types)?);
    }
    Ok(table)
}

fn build_column(raw: &RawColumn, names: &NameConverter, types: &TypeMapper) -> Result<Column> {
    Ok(Column {
        name: names.convert(&raw.name)?,
        db_name: raw.name.clone(),
        ty: types.map(&raw.data_type, raw.nullable).map(str::to_string),
        db_type: raw.data_type.clone(),
        is_array: raw.is_array,
        length: raw.length,
        user_defined: raw.user_defined,
        nullable: raw.nullable,
        has_default: raw.has_default,
        comment: raw.comment.clone(),
        is_primary_key: raw.is_primary_key,
        fk_column: None,
        fk_column_refs: Vec::new(),
        orig: raw.orig.clone(),
    })
}

fn build_enum(
    raw: &RawEnum,
    schema_id: SchemaId,
    schema: &Schema,
    names: &NameConverter,
) -> Result<Enum> {
    let table = raw.table.as_deref().and_then(|t| {
        let found = schema.table_by_db_name(t);
        if found.is_none() {
            warn!(
                "Enum {} belongs to unknown table {}.{}",
                raw.name, schema.db_name, t
            );
        }
        found
    });
    let values = raw
        .values
        .iter()
        .map(|v| {
            Ok(EnumValue {
                name: names.convert(&v.name)?,
                db_name: v.name.clone(),
                value: v.value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Enum {
        name: names.convert(&raw.name)?,
        db_name: raw.name.clone(),
        schema: schema_id,
        table,
        values,
    })
}
