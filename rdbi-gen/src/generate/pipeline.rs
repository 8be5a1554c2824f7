//! Per-unit, per-target generation
//!
//! Units are processed sequentially: schema targets, then enum targets, then
//! table targets, schema by schema in configured order. For every (unit,
//! target) pair the filename is rendered, the no-overwrite policy consulted,
//! the contents rendered (in process or by the external engine) and written,
//! and the post-run hook invoked. Any failure aborts the run.

use std::path::PathBuf;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tera::Context;
use tracing::{debug, info};

use super::writer::AtomicFileWriter;
use crate::config::{OutputTarget, RunConfig, UnitKind};
use crate::error::Result;
use crate::model::{DbData, SchemaId};

/// Files touched by a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub written: Vec<PathBuf>,
    /// Existing files left alone because of a no-overwrite glob
    pub skipped: Vec<PathBuf>,
}

/// A schema, table or enum about to be rendered
struct Unit {
    kind: UnitKind,
    /// For error context, e.g. `table public.users`
    label: String,
    /// Values visible to filename templates
    filename_context: Context,
    data: Value,
}

/// Values shared by every unit
struct Shared {
    db: Value,
    config: Value,
    params: Value,
}

/// Data document for the external engine: the shared values plus one unit
struct Document<'a> {
    shared: &'a Shared,
    unit: &'a Unit,
}

impl Serialize for Document<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("db", &self.shared.db)?;
        map.serialize_entry("config", &self.shared.config)?;
        map.serialize_entry("params", &self.shared.params)?;
        map.serialize_entry(self.unit.kind.key(), &self.unit.data)?;
        map.end()
    }
}

pub struct GenerationPipeline<'a> {
    config: &'a RunConfig,
    data: &'a DbData,
    writer: AtomicFileWriter,
}

impl<'a> GenerationPipeline<'a> {
    pub fn new(config: &'a RunConfig, data: &'a DbData) -> Self {
        Self {
            config,
            data,
            writer: AtomicFileWriter,
        }
    }

    /// Generate every configured target for every unit
    pub fn run(&self) -> Result<GenerationReport> {
        let shared = self.shared()?;
        // In-process templates all render against this one context; only the
        // unit key changes between units
        let mut context = Context::new();
        context.insert("db", &shared.db);
        context.insert("config", &shared.config);
        context.insert("params", &shared.params);
        let mut report = GenerationReport::default();

        for kind in [UnitKind::Schema, UnitKind::Enum, UnitKind::Table] {
            if self.config.targets(kind).is_empty() {
                info!(
                    "No {} paths specified, skipping {}s.",
                    kind.key(),
                    kind.key()
                );
                continue;
            }
            for schema in self.data.schema_ids() {
                for unit in self.units(kind, schema)? {
                    context.insert(kind.key(), &unit.data);
                    for target in self.config.targets(kind) {
                        self.generate(&unit, target, &shared, &context, &mut report)
                            .map_err(|e| {
                                e.context(format!(
                                    "generating {:?} for {}",
                                    target.filename, unit.label
                                ))
                            })?;
                    }
                    context.remove(kind.key());
                }
            }
        }

        info!(
            "Generated {} files ({} skipped)",
            report.written.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Values shared by every unit: `db`, `config` and `params`
    fn shared(&self) -> Result<Shared> {
        Ok(Shared {
            db: serde_json::to_value(self.data.view())?,
            config: self.config.template_config()?,
            params: self.config.params(),
        })
    }

    fn units(&self, kind: UnitKind, schema_id: SchemaId) -> Result<Vec<Unit>> {
        let schema = self.data.schema(schema_id);
        let mut units = Vec::new();

        match kind {
            UnitKind::Schema => {
                let mut filename_context = Context::new();
                filename_context.insert("schema", &schema.name);
                units.push(Unit {
                    kind,
                    label: format!("schema {}", schema.db_name),
                    filename_context,
                    data: serde_json::to_value(self.data.schema_view(schema_id))?,
                });
            }
            UnitKind::Table => {
                for &id in &schema.tables {
                    let table = self.data.table(id);
                    let mut filename_context = Context::new();
                    filename_context.insert("schema", &schema.name);
                    filename_context.insert("table", &table.name);
                    units.push(Unit {
                        kind,
                        label: format!("table {}.{}", schema.db_name, table.db_name),
                        filename_context,
                        data: serde_json::to_value(self.data.table_view(id))?,
                    });
                }
            }
            UnitKind::Enum => {
                for &id in &schema.enums {
                    let item = self.data.enum_(id);
                    let owner = item
                        .table
                        .map(|t| self.data.table(t).db_name.as_str())
                        .unwrap_or_default();
                    let mut filename_context = Context::new();
                    filename_context.insert("schema", &schema.name);
                    filename_context.insert("enum", &item.name);
                    filename_context.insert("table", owner);
                    units.push(Unit {
                        kind,
                        label: format!("enum {}.{}", schema.db_name, item.db_name),
                        filename_context,
                        data: serde_json::to_value(self.data.enum_view(id))?,
                    });
                }
            }
        }
        Ok(units)
    }

    fn generate(
        &self,
        unit: &Unit,
        target: &OutputTarget,
        shared: &Shared,
        context: &Context,
        report: &mut GenerationReport,
    ) -> Result<()> {
        let config = self.config;
        let filename = config
            .templates
            .render(&target.filename_template, &unit.filename_context)?;
        let path = config.output_dir.join(&filename);

        if config.policy.protects(&filename, &path) {
            debug!("Skipping {}: protected by no_overwrite_globs", path.display());
            report.skipped.push(path);
            return Ok(());
        }

        match &config.engine {
            Some(engine) => {
                let document = Document { shared, unit };
                engine.run(&document, &target.contents_path, &path, &config.env)?;
            }
            None => {
                let contents = config
                    .templates
                    .render(&target.contents_template, context)?;
                self.writer.write(&path, contents.as_bytes())?;
            }
        }
        debug!("Wrote {}", path.display());

        if let Some(post_run) = &config.post_run {
            post_run.run(&path, &config.env)?;
        }

        report.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::config::Settings;
    use crate::driver::{DriverRegistry, RawColumn, RawSchema, RawTable, SchemaInfo};
    use crate::env::Environ;
    use crate::model::{build_data, NameConverter, TypeMapper};

    fn data(tables: &[&str]) -> DbData {
        let info = SchemaInfo {
            schemas: vec![RawSchema {
                name: "public".into(),
                tables: tables
                    .iter()
                    .map(|name| RawTable {
                        name: name.to_string(),
                        columns: vec![RawColumn {
                            name: "id".into(),
                            data_type: "BIGINT".into(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    })
                    .collect(),
                enums: vec![],
            }],
        };
        let names = NameConverter::new("{{ name }}").unwrap();
        build_data(&info, &names, &TypeMapper::default()).unwrap()
    }

    fn run_config(dir: &Path, settings: Settings) -> RunConfig {
        RunConfig::from_settings(
            settings,
            dir,
            &DriverRegistry::with_builtin(),
            Environ::default(),
        )
        .unwrap()
    }

    fn settings() -> Settings {
        Settings {
            conn_str: "unused.sql".into(),
            schemas: vec!["public".into()],
            output_dir: "out".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unit_key_does_not_leak_between_kinds() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("schema.tera"), "{{ schema.db_name }}").unwrap();
        // Table documents carry no `schema` key, even after a schema unit ran
        fs::write(
            dir.path().join("table.tera"),
            "{{ table.db_name }}:{% if schema %}leak{% endif %}:{{ db.schemas | length }}",
        )
        .unwrap();

        let mut settings = settings();
        settings
            .schema_paths
            .insert("{{ schema }}.txt".into(), "schema.tera".into());
        settings
            .table_paths
            .insert("{{ table }}.txt".into(), "table.tera".into());
        let config = run_config(dir.path(), settings);
        let data = data(&["users", "posts"]);

        let report = GenerationPipeline::new(&config, &data).run().unwrap();

        assert_eq!(report.written.len(), 3);
        let out = dir.path().join("out");
        assert_eq!(fs::read_to_string(out.join("public.txt")).unwrap(), "public");
        assert_eq!(fs::read_to_string(out.join("users.txt")).unwrap(), "users::1");
        assert_eq!(fs::read_to_string(out.join("posts.txt")).unwrap(), "posts::1");
    }

    #[test]
    fn test_document_holds_shared_values_and_unit() {
        let shared = Shared {
            db: serde_json::json!({"schemas": []}),
            config: serde_json::json!({"schemas": ["public"]}),
            params: serde_json::json!({"crate_name": "models"}),
        };
        let unit = Unit {
            kind: UnitKind::Enum,
            label: "enum public.mood".into(),
            filename_context: Context::new(),
            data: serde_json::json!({"db_name": "mood"}),
        };

        let value = serde_json::to_value(Document {
            shared: &shared,
            unit: &unit,
        })
        .unwrap();

        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(value["enum"]["db_name"], "mood");
        assert_eq!(value["params"]["crate_name"], "models");
        assert_eq!(value["config"]["schemas"][0], "public");
    }
}
