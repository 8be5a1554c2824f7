//! Configuration file model for rdbi-gen

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::defaults;
use crate::error::{GenError, Result};

/// Contents of `rdbi-gen.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Connection string handed to the driver; `$VAR` references are expanded
    #[serde(default)]
    pub conn_str: String,

    /// Name of the driver to read the schema with
    #[serde(default = "default_db_type")]
    pub db_type: String,

    /// Schemas to read, in generation order
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Template applied to every database name, with the name bound as `name`
    #[serde(default = "default_name_conversion")]
    pub name_conversion: String,

    /// Tables to read (`table` or `schema.table`); empty means all
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to skip (`table` or `schema.table`)
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Command run after each file is written; `$RDBI_GEN_FILE` is the file
    #[serde(default)]
    pub post_run: Vec<String>,

    #[serde(default = "default_post_run_timeout_secs")]
    pub post_run_timeout_secs: u64,

    /// Root of all generated files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Base for contents template paths
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// Directory copied verbatim into `output_dir` after generation
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Existing files whose rendered name matches one of these are left alone
    #[serde(default)]
    pub no_overwrite_globs: Vec<String>,

    /// Filename template -> contents template path, rendered once per schema
    #[serde(default)]
    pub schema_paths: BTreeMap<String, PathBuf>,

    /// Filename template -> contents template path, rendered once per table
    #[serde(default)]
    pub table_paths: BTreeMap<String, PathBuf>,

    /// Filename template -> contents template path, rendered once per enum
    #[serde(default)]
    pub enum_paths: BTreeMap<String, PathBuf>,

    /// External rendering engine; unset means in-process templates
    #[serde(default)]
    pub template_engine: EngineSettings,

    /// Free-form values exposed to templates as `params`
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub type_map: HashMap<String, String>,

    #[serde(default)]
    pub nullable_type_map: HashMap<String, String>,

    /// Log level (trace, debug, info, warn, error)
    /// Can be overridden by RUST_LOG env var
    #[serde(default)]
    pub log_level: Option<String>,
}

/// `[template_engine]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Command line templates; may use `data`, `template` and `output`
    #[serde(default)]
    pub command_line: Vec<String>,

    /// Stream the data document on stdin instead of a temp file
    #[serde(default)]
    pub use_stdin: bool,

    /// Take the rendered output from stdout instead of the output file
    #[serde(default)]
    pub use_stdout: bool,

    #[serde(default = "default_engine_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions for serde
fn default_db_type() -> String {
    defaults::DB_TYPE.to_string()
}
fn default_name_conversion() -> String {
    defaults::NAME_CONVERSION.to_string()
}
fn default_post_run_timeout_secs() -> u64 {
    defaults::POST_RUN_TIMEOUT_SECS
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(defaults::OUTPUT_DIR)
}
fn default_template_dir() -> PathBuf {
    PathBuf::from(defaults::TEMPLATE_DIR)
}
fn default_engine_timeout_secs() -> u64 {
    defaults::ENGINE_TIMEOUT_SECS
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command_line: Vec::new(),
            use_stdin: false,
            use_stdout: false,
            timeout_secs: default_engine_timeout_secs(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            conn_str: String::new(),
            db_type: default_db_type(),
            schemas: Vec::new(),
            name_conversion: default_name_conversion(),
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            post_run: Vec::new(),
            post_run_timeout_secs: default_post_run_timeout_secs(),
            output_dir: default_output_dir(),
            template_dir: default_template_dir(),
            static_dir: None,
            no_overwrite_globs: Vec::new(),
            schema_paths: BTreeMap::new(),
            table_paths: BTreeMap::new(),
            enum_paths: BTreeMap::new(),
            template_engine: EngineSettings::default(),
            params: serde_json::Map::new(),
            type_map: HashMap::new(),
            nullable_type_map: HashMap::new(),
            log_level: None,
        }
    }
}

impl Settings {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GenError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let settings: Settings = toml::from_str(&content).map_err(|e| {
            GenError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.conn_str.trim().is_empty() {
            return Err(GenError::Validation("conn_str is required".into()));
        }

        if self.schemas.is_empty() {
            return Err(GenError::Validation(
                "at least one schema must be listed in schemas".into(),
            ));
        }

        if !self.include_tables.is_empty() && !self.exclude_tables.is_empty() {
            return Err(GenError::Validation(
                "include_tables and exclude_tables cannot both be set".into(),
            ));
        }

        if self.post_run_timeout_secs == 0 {
            return Err(GenError::Validation(
                "post_run_timeout_secs must be greater than zero".into(),
            ));
        }

        if self.uses_engine() && self.template_engine.timeout_secs == 0 {
            return Err(GenError::Validation(
                "template_engine.timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Whether contents are rendered by an external program
    pub fn uses_engine(&self) -> bool {
        !self.template_engine.command_line.is_empty()
    }
}
