//! DDL file driver using sqlparser-rs
//!
//! The connection string is the path of a SQL file, optionally followed by
//! `?dialect=<name>` (any name sqlparser knows; MySQL when omitted).

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlparser::ast::{
    ColumnDef, ColumnOption, CreateIndex, CreateTable, DataType, EnumMember, Expr,
    ForeignKeyConstraint, Ident, IndexColumn, IndexConstraint, ObjectName, PrimaryKeyConstraint,
    Statement, TableConstraint, UniqueConstraint, UserDefinedTypeRepresentation,
};
use sqlparser::dialect::{dialect_from_str, Dialect, MySqlDialect};
use sqlparser::parser::Parser;
use tracing::{debug, info, warn};

use super::raw::*;
use super::{Driver, TableFilter};
use crate::error::{GenError, Result};

/// Reads tables, keys, indexes and enums from `CREATE TABLE`, `CREATE INDEX`
/// and `CREATE TYPE ... AS ENUM` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct DdlDriver;

impl Driver for DdlDriver {
    fn name(&self) -> &str {
        "ddl"
    }

    fn parse(
        &self,
        conn_str: &str,
        schemas: &[String],
        filter: &TableFilter,
    ) -> Result<SchemaInfo> {
        let (path, dialect_name) = split_conn_str(conn_str);
        info!("Reading DDL from {} (dialect {})", path, dialect_name);
        let sql = std::fs::read_to_string(path).map_err(|e| GenError::Driver {
            driver: self.name().into(),
            message: format!("cannot read {}: {}", path, e),
        })?;
        let dialect = resolve_dialect(dialect_name)?;
        parse_ddl(&sql, dialect.as_ref(), schemas, filter)
    }
}

/// Raw column data kept for templates as `orig`
#[derive(Debug, Serialize)]
struct DdlColumn {
    column_type: String,
    default_value: Option<String>,
    is_auto_increment: bool,
    is_unsigned: bool,
}

fn split_conn_str(conn_str: &str) -> (&str, &str) {
    match conn_str.split_once('?') {
        Some((path, query)) => {
            let dialect = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("dialect="))
                .unwrap_or("mysql");
            (path, dialect)
        }
        None => (conn_str, "mysql"),
    }
}

fn resolve_dialect(name: &str) -> Result<Box<dyn Dialect>> {
    if name.eq_ignore_ascii_case("mysql") {
        return Ok(Box::new(MySqlDialect {}));
    }
    dialect_from_str(name).ok_or_else(|| GenError::Driver {
        driver: "ddl".into(),
        message: format!("unknown SQL dialect {:?}", name),
    })
}

/// Parse DDL text into schema info for the requested schemas.
///
/// Unqualified tables, types and indexes belong to the first requested schema.
pub fn parse_ddl(
    sql: &str,
    dialect: &dyn Dialect,
    schemas: &[String],
    filter: &TableFilter,
) -> Result<SchemaInfo> {
    let statements = Parser::parse_sql(dialect, sql)?;
    let default_schema = schemas.first().map(String::as_str).unwrap_or_default();

    let mut by_schema: HashMap<&str, RawSchema> = schemas
        .iter()
        .map(|s| {
            (
                s.as_str(),
                RawSchema {
                    name: s.clone(),
                    ..Default::default()
                },
            )
        })
        .collect();

    let enum_types = enum_type_names(&statements);
    let mut create_indexes = Vec::new();

    for stmt in &statements {
        match stmt {
            Statement::CreateTable(create) => {
                let (schema_name, table_name) = split_object_name(&create.name);
                let schema_name = schema_name.as_deref().unwrap_or(default_schema);

                let Some(schema) = by_schema.get_mut(schema_name) else {
                    debug!("skipping table {}.{} in unrequested schema", schema_name, table_name);
                    continue;
                };
                if !filter.includes(schema_name, &table_name) {
                    debug!("skipping filtered-out table {}.{}", schema_name, table_name);
                    continue;
                }

                let (table, enums) = extract_table(create, table_name, &enum_types)?;
                schema.tables.push(table);
                schema.enums.extend(enums);
            }
            Statement::CreateType {
                name,
                representation: Some(UserDefinedTypeRepresentation::Enum { labels }),
            } => {
                let (schema_name, type_name) = split_object_name(name);
                let schema_name = schema_name.as_deref().unwrap_or(default_schema);
                match by_schema.get_mut(schema_name) {
                    Some(schema) => schema.enums.push(RawEnum {
                        name: type_name,
                        table: None,
                        values: number_labels(labels.iter().map(extract_ident)),
                    }),
                    None => debug!("skipping type {}.{} in unrequested schema", schema_name, type_name),
                }
            }
            Statement::CreateIndex(index) => create_indexes.push(index),
            _ => {}
        }
    }

    // Indexes may be declared before or after their table
    for index in create_indexes {
        attach_index(&mut by_schema, index, default_schema);
    }

    let mut schemas = schemas
        .iter()
        .filter_map(|s| by_schema.remove(s.as_str()))
        .collect::<Vec<_>>();
    resolve_primary_key_references(&mut schemas);
    let info = SchemaInfo { schemas };
    info!("Found {} tables", info.table_count());
    Ok(info)
}

/// Unqualified names of every `CREATE TYPE ... AS ENUM` in the file
fn enum_type_names(statements: &[Statement]) -> HashSet<String> {
    statements
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::CreateType {
                name,
                representation: Some(UserDefinedTypeRepresentation::Enum { .. }),
            } => Some(split_object_name(name).1),
            _ => None,
        })
        .collect()
}

/// Enum labels numbered from 1 in declaration order
fn number_labels(labels: impl IntoIterator<Item = String>) -> Vec<RawEnumValue> {
    labels
        .into_iter()
        .zip(1..)
        .map(|(name, value)| RawEnumValue { name, value })
        .collect()
}

/// Add a standalone `CREATE [UNIQUE] INDEX` to the table it names
fn attach_index(
    by_schema: &mut HashMap<&str, RawSchema>,
    index: &CreateIndex,
    default_schema: &str,
) {
    let (schema_name, table_name) = split_object_name(&index.table_name);
    let schema_name = schema_name.as_deref().unwrap_or(default_schema);
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(extract_ident_from_index_column)
        .collect();
    let name = match &index.name {
        Some(name) => split_object_name(name).1,
        None => format!(
            "{}_{}_{}",
            table_name,
            columns.join("_"),
            if index.unique { "key" } else { "idx" }
        ),
    };

    let table = by_schema
        .get_mut(schema_name)
        .and_then(|schema| schema.tables.iter_mut().find(|t| t.name == table_name));
    match table {
        Some(table) => table.indexes.push(RawIndex {
            name,
            is_unique: index.unique,
            columns,
        }),
        None => debug!(
            "skipping index {} on table {}.{} that was not read",
            name, schema_name, table_name
        ),
    }
}

/// Fill in references declared without a column list.
///
/// Such a reference targets the primary key of the referenced table, matched
/// by position within the constraint.
fn resolve_primary_key_references(schemas: &mut [RawSchema]) {
    let primary_keys: HashMap<(String, String), Vec<String>> = schemas
        .iter()
        .flat_map(|schema| {
            schema.tables.iter().map(move |table| {
                let pk = table
                    .columns
                    .iter()
                    .filter(|c| c.is_primary_key)
                    .map(|c| c.name.clone())
                    .collect();
                ((schema.name.clone(), table.name.clone()), pk)
            })
        })
        .collect();

    for schema in schemas.iter_mut() {
        for table in &mut schema.tables {
            let mut positions: HashMap<String, usize> = HashMap::new();
            for fk in &mut table.foreign_keys {
                if !fk.ref_column.is_empty() {
                    continue;
                }
                let position = positions.entry(fk.name.clone()).or_insert(0);
                let key = (
                    fk.ref_schema.clone().unwrap_or_else(|| schema.name.clone()),
                    fk.ref_table.clone(),
                );
                match primary_keys.get(&key).and_then(|pk| pk.get(*position)) {
                    Some(column) => fk.ref_column = column.clone(),
                    None => warn!(
                        "cannot resolve referenced column of {}.{}.{} in {}: no primary key column at position {}",
                        schema.name, table.name, fk.column_name, fk.name, position
                    ),
                }
                *position += 1;
            }
        }
    }
}

/// A column as read from its definition
struct ExtractedColumn {
    column: RawColumn,
    /// Column-level UNIQUE
    unique: bool,
    enum_values: Option<Vec<String>>,
    reference: Option<InlineReference>,
}

/// A column-level `REFERENCES other (col)`
struct InlineReference {
    constraint: Option<String>,
    foreign_table: ObjectName,
    /// `None` when the primary key of the referenced table is meant
    column: Option<String>,
}

/// Extract a table (and its inline enums) from a CREATE TABLE statement
fn extract_table(
    create: &CreateTable,
    name: String,
    enum_types: &HashSet<String>,
) -> Result<(RawTable, Vec<RawEnum>)> {
    let mut columns = Vec::new();
    let mut indexes = Vec::new();
    let mut foreign_keys = Vec::new();
    let mut enums = Vec::new();

    for col_def in &create.columns {
        let ExtractedColumn {
            column,
            unique: col_unique,
            enum_values,
            reference,
        } = extract_column(col_def, enum_types)?;

        if let Some(reference) = reference {
            let (ref_schema, ref_table) = split_object_name(&reference.foreign_table);
            foreign_keys.push(RawForeignKey {
                name: reference
                    .constraint
                    .unwrap_or_else(|| format!("{}_{}_fkey", name, column.name)),
                column_name: column.name.clone(),
                ref_schema,
                ref_table,
                ref_column: reference.column.unwrap_or_default(),
            });
        }

        // Handle column-level UNIQUE
        if col_unique {
            indexes.push(RawIndex {
                name: format!("{}_unique", column.name),
                is_unique: true,
                columns: vec![column.name.clone()],
            });
        }

        // In MySQL an enum belongs to its column; name it after the column
        if let Some(values) = enum_values {
            enums.push(RawEnum {
                name: column.name.clone(),
                table: Some(name.clone()),
                values: number_labels(values),
            });
        }

        columns.push(column);
    }

    // Extract table-level constraints
    for constraint in &create.constraints {
        match constraint {
            TableConstraint::PrimaryKey(PrimaryKeyConstraint {
                columns: pk_cols, ..
            }) => {
                for pk_col in pk_cols {
                    let col_name = extract_ident_from_index_column(pk_col);
                    if let Some(col) = columns.iter_mut().find(|c| c.name == col_name) {
                        col.is_primary_key = true;
                        col.nullable = false;
                    }
                }
            }
            TableConstraint::Unique(UniqueConstraint {
                columns: uniq_cols,
                name: idx_name,
                ..
            }) => {
                let idx_name = idx_name.as_ref().map(extract_ident).unwrap_or_else(|| {
                    let first_col = extract_ident_from_index_column(&uniq_cols[0]);
                    format!("{}_unique", first_col)
                });
                indexes.push(RawIndex {
                    name: idx_name,
                    is_unique: true,
                    columns: uniq_cols
                        .iter()
                        .map(extract_ident_from_index_column)
                        .collect(),
                });
            }
            TableConstraint::Index(IndexConstraint {
                columns: idx_cols,
                name: idx_name,
                ..
            }) => {
                let idx_name = idx_name.as_ref().map(extract_ident).unwrap_or_else(|| {
                    let first_col = extract_ident_from_index_column(&idx_cols[0]);
                    format!("idx_{}", first_col)
                });
                indexes.push(RawIndex {
                    name: idx_name,
                    is_unique: false,
                    columns: idx_cols
                        .iter()
                        .map(extract_ident_from_index_column)
                        .collect(),
                });
            }
            TableConstraint::ForeignKey(ForeignKeyConstraint {
                name: fk_name,
                columns: fk_cols,
                foreign_table,
                referred_columns,
                ..
            }) => {
                let (ref_schema, ref_table) = split_object_name(foreign_table);
                let fk_name = fk_name.as_ref().map(extract_ident).unwrap_or_else(|| {
                    let cols: Vec<String> = fk_cols.iter().map(extract_ident).collect();
                    format!("{}_{}_fkey", name, cols.join("_"))
                });
                // An empty ref column is resolved against the primary key later
                for (i, col) in fk_cols.iter().enumerate() {
                    foreign_keys.push(RawForeignKey {
                        name: fk_name.clone(),
                        column_name: extract_ident(col),
                        ref_schema: ref_schema.clone(),
                        ref_table: ref_table.clone(),
                        ref_column: referred_columns
                            .get(i)
                            .map(extract_ident)
                            .unwrap_or_default(),
                    });
                }
            }
            _ => {}
        }
    }

    // Primary key columns first in the index list, like the database catalogs
    let pk_cols: Vec<String> = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.clone())
        .collect();
    if !pk_cols.is_empty() {
        indexes.insert(
            0,
            RawIndex {
                name: format!("{}_pkey", name),
                is_unique: true,
                columns: pk_cols,
            },
        );
    }

    let table = RawTable {
        name,
        comment: String::new(), // sqlparser doesn't expose table comments directly
        columns,
        indexes,
        foreign_keys,
    };
    Ok((table, enums))
}

/// Extract a column with its column-level UNIQUE, enum labels and reference
fn extract_column(col_def: &ColumnDef, enum_types: &HashSet<String>) -> Result<ExtractedColumn> {
    let name = extract_ident(&col_def.name);
    let column_type = format!("{}", col_def.data_type);
    let enum_values = extract_enum_values(&col_def.data_type);
    let is_enum_type = match &col_def.data_type {
        DataType::Custom(type_name, _) => enum_types.contains(&split_object_name(type_name).1),
        _ => false,
    };
    let is_unsigned = column_type.to_uppercase().contains("UNSIGNED");

    let (data_type, is_array) = match column_type.strip_suffix("[]") {
        Some(elem) => (elem.to_string(), true),
        None if enum_values.is_some() => ("enum".to_string(), false),
        None => (column_type.clone(), false),
    };

    let mut nullable = true; // Default to nullable
    let mut default_value = None;
    let mut is_auto_increment = false;
    let mut is_primary_key = false;
    let mut col_is_unique = false;
    let mut comment = String::new();
    let mut reference = None;

    for option in &col_def.options {
        match &option.option {
            ColumnOption::NotNull => {
                nullable = false;
            }
            ColumnOption::Null => {
                nullable = true;
            }
            ColumnOption::Default(expr) => {
                default_value = Some(format!("{}", expr));
            }
            ColumnOption::PrimaryKey(_) => {
                is_primary_key = true;
                nullable = false;
            }
            ColumnOption::Unique(_) => {
                col_is_unique = true;
            }
            ColumnOption::Comment(c) => {
                comment = c.clone();
            }
            ColumnOption::ForeignKey(fk) => {
                reference = Some(InlineReference {
                    constraint: option.name.as_ref().map(extract_ident),
                    foreign_table: fk.foreign_table.clone(),
                    column: fk.referred_columns.first().map(extract_ident),
                });
            }
            ColumnOption::DialectSpecific(tokens) => {
                // Check for AUTO_INCREMENT in MySQL-specific options
                let token_str = tokens
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_uppercase();
                if token_str.contains("AUTO_INCREMENT") {
                    is_auto_increment = true;
                }
            }
            _ => {}
        }
    }

    let orig = Orig::from_serialize(&DdlColumn {
        column_type: column_type.clone(),
        default_value: default_value.clone(),
        is_auto_increment,
        is_unsigned,
    })?;

    let column = RawColumn {
        name,
        length: type_length(&column_type),
        data_type,
        is_array,
        user_defined: enum_values.is_some() || is_enum_type,
        nullable,
        has_default: default_value.is_some() || is_auto_increment,
        comment,
        is_primary_key,
        orig,
    };

    Ok(ExtractedColumn {
        column,
        unique: col_is_unique,
        enum_values,
        reference,
    })
}

/// Length carried by the type itself, e.g. 255 for `VARCHAR(255)`
fn type_length(column_type: &str) -> u32 {
    column_type
        .rsplit_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .and_then(|(len, _)| len.trim().parse().ok())
        .unwrap_or(0)
}

/// Extract enum values from a data type
fn extract_enum_values(data_type: &DataType) -> Option<Vec<String>> {
    match data_type {
        DataType::Enum(members, _) => Some(
            members
                .iter()
                .map(|m| match m {
                    EnumMember::Name(s) => s.clone(),
                    EnumMember::NamedValue(s, _) => s.clone(),
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Split a possibly qualified name into (schema, name)
fn split_object_name(name: &ObjectName) -> (Option<String>, String) {
    let parts: Vec<String> = name
        .0
        .iter()
        .filter_map(|part| part.as_ident())
        .map(|ident| ident.value.clone())
        .collect();
    match parts.as_slice() {
        [] => (None, String::new()),
        [table] => (None, table.clone()),
        [.., schema, table] => (Some(schema.clone()), table.clone()),
    }
}

/// Extract a string from an Ident, removing backticks if present
fn extract_ident(ident: &Ident) -> String {
    ident.value.clone()
}

/// Extract a column name string from an IndexColumn
fn extract_ident_from_index_column(ic: &IndexColumn) -> String {
    match &ic.column.expr {
        Expr::Identifier(ident) => ident.value.clone(),
        other => format!("{}", other),
    }
}
