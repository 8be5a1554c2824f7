//! Primary-key, index and foreign-key linkage
//!
//! Runs after every schema, table and column node exists. Resolution only
//! reads the model; edges in both directions are then attached in one pass.
//! Anything that fails to resolve is logged and left out.

use tracing::{debug, warn};

use super::convert::NameConverter;
use super::data::*;
use crate::driver::{RawForeignKey, RawTable};
use crate::error::Result;

/// Links flat driver rows into the table graph
pub struct CrossReferenceBuilder<'a> {
    names: &'a NameConverter,
}

impl<'a> CrossReferenceBuilder<'a> {
    pub fn new(names: &'a NameConverter) -> Self {
        Self { names }
    }

    /// Link every table in `raw`, given in driver order, into `data`
    pub fn link(&self, data: &mut DbData, raw: &[(TableId, &RawTable)]) -> Result<()> {
        for &(id, _) in raw {
            project_primary_keys(&mut data.tables[id.0]);
        }

        for &(id, table) in raw {
            let indexes = self.resolve_indexes(data, id, table)?;
            let owner = &mut data.tables[id.0];
            for index in indexes {
                owner.index_index.insert(index.db_name.clone(), owner.indexes.len());
                owner.indexes.push(index);
            }
        }

        let mut pending = Vec::new();
        for &(id, table) in raw {
            pending.extend(self.resolve_foreign_keys(data, id, table)?);
        }
        for fk in pending {
            attach(data, fk);
        }
        Ok(())
    }

    fn resolve_indexes(&self, data: &DbData, id: TableId, raw: &RawTable) -> Result<Vec<Index>> {
        let table = data.table(id);
        let mut indexes = Vec::with_capacity(raw.indexes.len());

        'rows: for row in &raw.indexes {
            let mut columns = Vec::with_capacity(row.columns.len());
            for name in &row.columns {
                match table.column_position(name) {
                    Some(pos) => columns.push(pos),
                    None => {
                        warn!(
                            "Index {} on {} references unknown column {}, skipping",
                            row.name,
                            qualified(data, table),
                            name
                        );
                        continue 'rows;
                    }
                }
            }
            indexes.push(Index {
                name: self.names.convert(&row.name)?,
                db_name: row.name.clone(),
                is_unique: row.is_unique,
                columns,
            });
        }
        Ok(indexes)
    }

    fn resolve_foreign_keys(
        &self,
        data: &DbData,
        id: TableId,
        raw: &RawTable,
    ) -> Result<Vec<ForeignKey>> {
        let table = data.table(id);
        let mut keys = Vec::new();

        for (db_name, rows) in group_by_constraint(&raw.foreign_keys) {
            let mut ref_table: Option<TableId> = None;
            let mut columns = Vec::with_capacity(rows.len());

            for row in rows {
                let ref_schema = row
                    .ref_schema
                    .as_deref()
                    .unwrap_or(&data.schema(table.schema).db_name);
                let Some(target) = data.find_table(ref_schema, &row.ref_table) else {
                    warn!(
                        "Foreign key {} on {} references unknown table {}.{}, skipping column {}",
                        db_name,
                        qualified(data, table),
                        ref_schema,
                        row.ref_table,
                        row.column_name
                    );
                    continue;
                };
                if ref_table.is_some_and(|t| t != target) {
                    warn!(
                        "Foreign key {} on {} references more than one table, skipping column {}",
                        db_name,
                        qualified(data, table),
                        row.column_name
                    );
                    continue;
                }
                let Some(column) = table.column_position(&row.column_name) else {
                    warn!(
                        "Foreign key {} on {} uses unknown column {}, skipping it",
                        db_name,
                        qualified(data, table),
                        row.column_name
                    );
                    continue;
                };
                let Some(ref_column) = data.table(target).column_position(&row.ref_column) else {
                    warn!(
                        "Foreign key {} references unknown column {}.{}, skipping it",
                        db_name,
                        qualified(data, data.table(target)),
                        row.ref_column
                    );
                    continue;
                };

                ref_table = Some(target);
                columns.push(FkColumn {
                    column: ColumnId { table: id, index: column },
                    ref_column: ColumnId {
                        table: target,
                        index: ref_column,
                    },
                    column_db_name: row.column_name.clone(),
                    ref_column_db_name: row.ref_column.clone(),
                });
            }

            match ref_table {
                Some(ref_table) if !columns.is_empty() => keys.push(ForeignKey {
                    name: self.names.convert(db_name)?,
                    db_name: db_name.to_string(),
                    table: id,
                    ref_table,
                    columns,
                }),
                _ => warn!(
                    "Foreign key {} on {} has no resolvable columns, skipping",
                    db_name,
                    qualified(data, table)
                ),
            }
        }
        Ok(keys)
    }
}

fn project_primary_keys(table: &mut Table) {
    table.primary_keys = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_primary_key)
        .map(|(i, _)| i)
        .collect();
}

/// Group rows by constraint name, in order of first appearance
fn group_by_constraint(rows: &[RawForeignKey]) -> Vec<(&str, Vec<&RawForeignKey>)> {
    let mut groups: Vec<(&str, Vec<&RawForeignKey>)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(name, _)| *name == row.name) {
            Some((_, members)) => members.push(row),
            None => groups.push((row.name.as_str(), vec![row])),
        }
    }
    groups
}

/// Register a resolved key on both tables and all participating columns
fn attach(data: &mut DbData, fk: ForeignKey) {
    let id = ForeignKeyId(data.foreign_keys.len());

    let owner = &mut data.tables[fk.table.0];
    owner.fk_index.insert(fk.db_name.clone(), id);
    owner.foreign_keys.push(id);

    let target = &mut data.tables[fk.ref_table.0];
    target.fk_ref_index.insert(fk.db_name.clone(), id);
    target.foreign_key_refs.push(id);

    for (position, leaf) in fk.columns.iter().enumerate() {
        let leaf_id = FkColumnId { fk: id, position };
        if let Some(previous) = data.column(leaf.column).fk_column {
            // Only one key per column is exposed; the last one declared wins
            warn!(
                "Column {} is in foreign keys {} and {}; keeping {}",
                data.column(leaf.column).db_name,
                data.foreign_key(previous.fk).db_name,
                fk.db_name,
                fk.db_name
            );
        }
        data.column_mut(leaf.column).fk_column = Some(leaf_id);
        data.column_mut(leaf.ref_column).fk_column_refs.push(leaf_id);
    }

    debug!("Linked foreign key {} ({} columns)", fk.db_name, fk.columns.len());
    data.foreign_keys.push(fk);
}

fn qualified(data: &DbData, table: &Table) -> String {
    format!("{}.{}", data.schema(table.schema).db_name, table.db_name)
}
