//! JSON snapshot driver
//!
//! Reads a [`SchemaInfo`] serialized to JSON, for generating without
//! database access.

use tracing::{debug, info};

use super::raw::SchemaInfo;
use super::{Driver, TableFilter};
use crate::error::{GenError, Result};

/// Serves schema information from a JSON file; the connection string is its path
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotDriver;

impl Driver for SnapshotDriver {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(
        &self,
        conn_str: &str,
        schemas: &[String],
        filter: &TableFilter,
    ) -> Result<SchemaInfo> {
        info!("Reading schema snapshot from {}", conn_str);
        let text = std::fs::read_to_string(conn_str).map_err(|e| GenError::Driver {
            driver: self.name().into(),
            message: format!("cannot read {}: {}", conn_str, e),
        })?;
        let info: SchemaInfo = serde_json::from_str(&text).map_err(|e| GenError::Driver {
            driver: self.name().into(),
            message: format!("invalid snapshot {}: {}", conn_str, e),
        })?;
        Ok(select(info, schemas, filter))
    }
}

/// Keep the requested schemas, in request order, minus filtered-out tables
fn select(mut info: SchemaInfo, schemas: &[String], filter: &TableFilter) -> SchemaInfo {
    let mut selected = Vec::with_capacity(schemas.len());
    for name in schemas {
        let Some(pos) = info.schemas.iter().position(|s| &s.name == name) else {
            debug!("schema {} not present in snapshot", name);
            continue;
        };
        let mut schema = info.schemas.swap_remove(pos);
        schema
            .tables
            .retain(|t| filter.includes(&schema.name, &t.name));
        let kept: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        // Column-scoped enums go with their table
        schema.enums.retain(|e| match &e.table {
            Some(table) => kept.contains(&table.as_str()),
            None => true,
        });
        selected.push(schema);
    }
    SchemaInfo { schemas: selected }
}
