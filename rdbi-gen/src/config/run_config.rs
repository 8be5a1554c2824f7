//! Compiled run configuration
//!
//! Everything that can fail before the database is read is checked here:
//! templates are parsed, globs compiled, the driver looked up and paths
//! resolved against the config file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use super::settings::Settings;
use crate::driver::{DriverRegistry, TableFilter};
use crate::env::Environ;
use crate::error::{GenError, Result};
use crate::generate::{ExternalEngine, NoOverwritePolicy, PostRunExecutor};
use crate::model::{NameConverter, TypeMapper};
use crate::template::TemplateSet;

/// Kind of unit a target is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Schema,
    Table,
    Enum,
}

impl UnitKind {
    /// Key the unit's data is exposed under in templates
    pub fn key(self) -> &'static str {
        match self {
            UnitKind::Schema => "schema",
            UnitKind::Table => "table",
            UnitKind::Enum => "enum",
        }
    }
}

/// One (filename template, contents template) pair
#[derive(Debug, Clone)]
pub struct OutputTarget {
    /// Filename template source, relative to the output directory once rendered
    pub filename: String,
    /// Contents template path as configured, relative to `template_dir`
    pub contents: PathBuf,
    /// Contents template path resolved on disk
    pub contents_path: PathBuf,
    pub(crate) filename_template: String,
    pub(crate) contents_template: String,
}

/// Everything a generation run needs, validated and compiled
#[derive(Debug)]
pub struct RunConfig {
    pub settings: Settings,
    /// Connection string with environment references expanded
    pub conn_str: String,
    pub filter: TableFilter,
    pub names: NameConverter,
    pub types: TypeMapper,
    pub templates: TemplateSet,
    pub schema_targets: Vec<OutputTarget>,
    pub table_targets: Vec<OutputTarget>,
    pub enum_targets: Vec<OutputTarget>,
    pub output_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub policy: NoOverwritePolicy,
    /// Set when contents are rendered by an external program
    pub engine: Option<ExternalEngine>,
    pub post_run: Option<PostRunExecutor>,
    pub env: Environ,
}

impl RunConfig {
    /// Compile `settings`, resolving relative paths against `base_dir`
    pub fn from_settings(
        settings: Settings,
        base_dir: &Path,
        registry: &DriverRegistry,
        env: Environ,
    ) -> Result<Self> {
        settings.validate()?;
        registry.get(&settings.db_type)?;

        let conn_str = env.expand(&settings.conn_str);
        let filter = TableFilter::new(&settings.include_tables, &settings.exclude_tables)?;
        let names = NameConverter::new(&settings.name_conversion)
            .map_err(|e| e.context("name_conversion"))?;
        let types = TypeMapper::new(
            settings.type_map.clone(),
            settings.nullable_type_map.clone(),
        );

        let output_dir = base_dir.join(&settings.output_dir);
        let template_dir = base_dir.join(&settings.template_dir);
        let static_dir = settings.static_dir.as_ref().map(|d| base_dir.join(d));

        let mut templates = TemplateSet::new();
        let schema_targets = targets(
            &mut templates,
            UnitKind::Schema,
            &settings.schema_paths,
            &template_dir,
        )?;
        let table_targets = targets(
            &mut templates,
            UnitKind::Table,
            &settings.table_paths,
            &template_dir,
        )?;
        let enum_targets = targets(
            &mut templates,
            UnitKind::Enum,
            &settings.enum_paths,
            &template_dir,
        )?;

        let engine = if settings.uses_engine() {
            let engine = &settings.template_engine;
            Some(ExternalEngine::new(
                &engine.command_line,
                engine.use_stdin,
                engine.use_stdout,
                Duration::from_secs(engine.timeout_secs),
            )?)
        } else {
            // In-process mode: contents templates must parse up front
            let mut sources = BTreeMap::new();
            for target in schema_targets
                .iter()
                .chain(&table_targets)
                .chain(&enum_targets)
            {
                if sources.contains_key(&target.contents_template) {
                    continue;
                }
                let source = std::fs::read_to_string(&target.contents_path).map_err(|e| {
                    GenError::Config(format!(
                        "cannot read template {}: {}",
                        target.contents_path.display(),
                        e
                    ))
                })?;
                sources.insert(target.contents_template.clone(), source);
            }
            templates.add_all(&sources)?;
            None
        };

        let post_run = if settings.post_run.is_empty() {
            None
        } else {
            Some(PostRunExecutor::new(
                settings.post_run.clone(),
                Duration::from_secs(settings.post_run_timeout_secs),
            )?)
        };

        Ok(Self {
            policy: NoOverwritePolicy::new(&settings.no_overwrite_globs)?,
            conn_str,
            filter,
            names,
            types,
            templates,
            schema_targets,
            table_targets,
            enum_targets,
            output_dir,
            static_dir,
            engine,
            post_run,
            env,
            settings,
        })
    }

    /// Targets configured for a unit kind
    pub fn targets(&self, kind: UnitKind) -> &[OutputTarget] {
        match kind {
            UnitKind::Schema => &self.schema_targets,
            UnitKind::Table => &self.table_targets,
            UnitKind::Enum => &self.enum_targets,
        }
    }

    /// Configuration exposed to templates as `config`
    pub fn template_config(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.settings)?)
    }

    /// `params` exposed to templates
    pub fn params(&self) -> Value {
        Value::Object(self.settings.params.clone())
    }
}

/// Compile filename templates for one unit kind
fn targets(
    templates: &mut TemplateSet,
    kind: UnitKind,
    paths: &BTreeMap<String, PathBuf>,
    template_dir: &Path,
) -> Result<Vec<OutputTarget>> {
    paths
        .iter()
        .map(|(filename, contents)| {
            let filename_template = format!("{}_paths[{}]", kind.key(), filename);
            templates.add(&filename_template, filename)?;
            Ok(OutputTarget {
                filename: filename.clone(),
                contents: contents.clone(),
                contents_path: template_dir.join(contents),
                filename_template,
                contents_template: template_name(contents),
            })
        })
        .collect()
}

/// Templates are named by their configured path, with `/` separators
fn template_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
