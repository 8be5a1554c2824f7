//! Database drivers: turn a connection string into a [`SchemaInfo`]

mod ddl;
mod raw;
mod snapshot;

pub use ddl::DdlDriver;
pub use raw::*;
pub use snapshot::SnapshotDriver;

use std::collections::{BTreeMap, HashSet};

use crate::error::{GenError, Result};

/// Source of raw schema information
pub trait Driver: Send + Sync {
    /// Name the driver is registered under (the config's `db_type`)
    fn name(&self) -> &str;

    /// Read the requested schemas.
    ///
    /// Tables rejected by `filter` must be left out of every returned
    /// structure, including their columns, indexes and constraints.
    fn parse(&self, conn_str: &str, schemas: &[String], filter: &TableFilter)
        -> Result<SchemaInfo>;
}

/// Drivers available to a run, looked up by name
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Box<dyn Driver>>,
}

impl DriverRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the drivers shipped with this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DdlDriver);
        registry.register(SnapshotDriver);
        registry
    }

    /// Add a driver, replacing any driver with the same name
    pub fn register(&mut self, driver: impl Driver + 'static) {
        self.drivers
            .insert(driver.name().to_string(), Box::new(driver));
    }

    /// Look up a driver by name
    pub fn get(&self, name: &str) -> Result<&dyn Driver> {
        self.drivers
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| GenError::UnknownDriver(name.to_string()))
    }

    /// Registered driver names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}

/// Inclusion predicate built from the include/exclude table lists.
///
/// Entries are either `table` (any schema) or `schema.table`. With neither
/// list set every table is included.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    include: HashSet<(Option<String>, String)>,
    exclude: HashSet<(Option<String>, String)>,
}

impl TableFilter {
    /// A filter that lets every table through
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Build a filter; setting both lists is rejected
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        if !include.is_empty() && !exclude.is_empty() {
            return Err(GenError::Validation(
                "include_tables and exclude_tables cannot both be set".into(),
            ));
        }
        Ok(Self {
            include: include.iter().map(|s| split_entry(s)).collect(),
            exclude: exclude.iter().map(|s| split_entry(s)).collect(),
        })
    }

    /// Whether `schema.table` should be read
    pub fn includes(&self, schema: &str, table: &str) -> bool {
        if !self.include.is_empty() {
            return matches(&self.include, schema, table);
        }
        !matches(&self.exclude, schema, table)
    }
}

fn split_entry(entry: &str) -> (Option<String>, String) {
    match entry.split_once('.') {
        Some((schema, table)) => (Some(schema.to_string()), table.to_string()),
        None => (None, entry.to_string()),
    }
}

fn matches(set: &HashSet<(Option<String>, String)>, schema: &str, table: &str) -> bool {
    set.contains(&(None, table.to_string()))
        || set.contains(&(Some(schema.to_string()), table.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_includes_everything() {
        let filter = TableFilter::new(&[], &[]).unwrap();
        assert!(filter.includes("anything", "any other thing"));
        assert!(TableFilter::allow_all().includes("public", "users"));
    }

    #[test]
    fn test_include_list() {
        let filter = TableFilter::new(&strings(&["users", "audit.events"]), &[]).unwrap();
        assert!(filter.includes("public", "users"));
        assert!(filter.includes("audit", "users"));
        assert!(filter.includes("audit", "events"));
        assert!(!filter.includes("public", "events"));
        assert!(!filter.includes("public", "orders"));
    }

    #[test]
    fn test_exclude_list() {
        let filter = TableFilter::new(&[], &strings(&["migrations", "public.tmp"])).unwrap();
        assert!(!filter.includes("public", "migrations"));
        assert!(!filter.includes("public", "tmp"));
        assert!(filter.includes("other", "tmp"));
        assert!(filter.includes("public", "users"));
    }

    #[test]
    fn test_include_and_exclude_rejected() {
        assert!(TableFilter::new(&strings(&["a"]), &strings(&["b"])).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = DriverRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["ddl", "json"]);
        assert_eq!(registry.get("ddl").unwrap().name(), "ddl");
        assert!(matches!(
            registry.get("oracle"),
            Err(GenError::UnknownDriver(name)) if name == "oracle"
        ));
    }
}
