//! Printing the model without generating anything

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use comfy_table::{presets, Table};

use crate::error::Result;
use crate::model::{DbData, TypeMapper};

/// Output format of `rdbi-gen preview`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreviewFormat {
    /// Human-readable tables
    #[default]
    Tabular,
    Yaml,
    Json,
    /// Every column type with its current mapping, as TOML type maps
    Types,
}

impl FromStr for PreviewFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tabular" => Ok(Self::Tabular),
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "types" => Ok(Self::Types),
            other => Err(format!(
                "unknown preview format {:?} (expected tabular, yaml, json or types)",
                other
            )),
        }
    }
}

impl fmt::Display for PreviewFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tabular => "tabular",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Types => "types",
        };
        f.write_str(name)
    }
}

/// Write the model to `out` in the given format
pub fn write_preview(
    data: &DbData,
    types: &TypeMapper,
    format: PreviewFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        PreviewFormat::Tabular => write_tabular(data, out),
        PreviewFormat::Yaml => {
            out.write_all(serde_yaml::to_string(&data.view())?.as_bytes())?;
            Ok(())
        }
        PreviewFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &data.view())?;
            writeln!(out)?;
            Ok(())
        }
        PreviewFormat::Types => write_types(data, types, out),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        ""
    }
}

fn write_tabular(data: &DbData, out: &mut dyn Write) -> Result<()> {
    for schema in &data.schemas {
        writeln!(out, "Schema: {} ({})", schema.name, schema.db_name)?;

        if !schema.enums.is_empty() {
            let mut table = Table::new();
            table.load_preset(presets::ASCII_FULL);
            table.set_header(vec!["Enum", "DB Name", "Table", "Values"]);
            for &id in &schema.enums {
                let item = data.enum_(id);
                let owner = item
                    .table
                    .map(|t| data.table(t).db_name.clone())
                    .unwrap_or_default();
                let values = item
                    .values
                    .iter()
                    .map(|v| format!("{} = {}", v.name, v.value))
                    .collect::<Vec<_>>()
                    .join(", ");
                table.add_row(vec![item.name.clone(), item.db_name.clone(), owner, values]);
            }
            writeln!(out, "\n{}", table)?;
        }

        for &id in &schema.tables {
            let t = data.table(id);
            writeln!(out, "\nTable: {} ({})", t.name, t.db_name)?;
            if !t.comment.is_empty() {
                writeln!(out, "  {}", t.comment)?;
            }

            let mut columns = Table::new();
            columns.load_preset(presets::ASCII_FULL);
            columns.set_header(vec![
                "Column", "DB Name", "Type", "DB Type", "Nullable", "PK", "FK", "Referenced",
            ]);
            for col in &t.columns {
                let fk = col
                    .fk_column
                    .map(|leaf| {
                        let key = data.foreign_key(leaf.fk);
                        let leaf = data.fk_column(leaf);
                        format!(
                            "{}.{}",
                            data.table(key.ref_table).db_name,
                            leaf.ref_column_db_name
                        )
                    })
                    .unwrap_or_default();
                columns.add_row(vec![
                    col.name.clone(),
                    col.db_name.clone(),
                    col.type_name().to_string(),
                    col.db_type.clone(),
                    yes_no(col.nullable).to_string(),
                    yes_no(col.is_primary_key).to_string(),
                    fk,
                    yes_no(col.has_fk_ref()).to_string(),
                ]);
            }
            writeln!(out, "{}", columns)?;

            if !t.indexes.is_empty() {
                let mut indexes = Table::new();
                indexes.load_preset(presets::ASCII_FULL);
                indexes.set_header(vec!["Index", "DB Name", "Unique", "Columns"]);
                for index in &t.indexes {
                    let cols = index
                        .columns
                        .iter()
                        .map(|&i| t.columns[i].db_name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    indexes.add_row(vec![
                        index.name.clone(),
                        index.db_name.clone(),
                        yes_no(index.is_unique).to_string(),
                        cols,
                    ]);
                }
                writeln!(out, "{}", indexes)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Every distinct column type, as ready-to-edit `[type_map]` sections
fn write_types(data: &DbData, types: &TypeMapper, out: &mut dyn Write) -> Result<()> {
    let mut plain = BTreeMap::new();
    let mut nullable = BTreeMap::new();
    for col in data.tables.iter().flat_map(|t| &t.columns) {
        let map = if col.nullable {
            &mut nullable
        } else {
            &mut plain
        };
        map.entry(col.db_type.as_str())
            .or_insert_with(|| types.lookup(&col.db_type, col.nullable));
    }

    for (section, entries) in [("type_map", &plain), ("nullable_type_map", &nullable)] {
        writeln!(out, "[{}]", section)?;
        for (db_type, mapped) in entries {
            let key = toml::Value::String(db_type.to_string());
            let value = toml::Value::String(mapped.unwrap_or_default().to_string());
            if mapped.is_some() {
                writeln!(out, "{} = {}", key, value)?;
            } else {
                writeln!(out, "{} = {}  # unmapped", key, value)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
