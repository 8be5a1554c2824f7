//! rdbi-gen: Render user templates from a database schema
//!
//! A driver reads schema metadata (tables, columns, indexes, foreign keys,
//! enums). The metadata is linked into a cross-referenced model, names and
//! types are converted to the target vocabulary, and user templates are
//! rendered once per schema, once per table and once per enum.
//!
//! # Configuration
//!
//! ```toml
//! conn_str = "schema.sql"
//! db_type = "ddl"
//! schemas = ["public"]
//! name_conversion = "{{ name | pascal }}"
//! output_dir = "src/generated"
//! no_overwrite_globs = ["*.custom.rs"]
//! post_run = ["rustfmt", "$RDBI_GEN_FILE"]
//!
//! [table_paths]
//! "{{ table | snake }}.rs" = "templates/table.rs.tera"
//!
//! [type_map]
//! "BIGINT" = "i64"
//!
//! [nullable_type_map]
//! "BIGINT" = "Option<i64>"
//! ```
//!
//! # Usage in build.rs
//!
//! ```rust,ignore
//! fn main() {
//!     rdbi_gen::GeneratorBuilder::new("rdbi-gen.toml")
//!         .generate()
//!         .expect("Failed to generate code");
//!
//!     println!("cargo:rerun-if-changed=rdbi-gen.toml");
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! rdbi-gen --config rdbi-gen.toml gen
//! rdbi-gen preview --format types
//! ```

pub mod config;
pub mod driver;
pub mod env;
pub mod error;
pub mod generate;
pub mod model;
pub mod preview;
pub mod template;

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

pub use config::{RunConfig, Settings};
pub use driver::{Driver, DriverRegistry, SchemaInfo, TableFilter};
pub use env::Environ;
pub use error::{GenError, Result};
pub use generate::GenerationReport;
pub use model::DbData;
pub use preview::PreviewFormat;

/// Generate all files described by the config file at `config_path`
pub fn generate(config_path: impl AsRef<Path>) -> Result<GenerationReport> {
    GeneratorBuilder::new(config_path).generate()
}

/// Print the model described by the config file at `config_path`
pub fn preview(
    config_path: impl AsRef<Path>,
    format: PreviewFormat,
    out: &mut dyn Write,
) -> Result<()> {
    GeneratorBuilder::new(config_path).preview(format, out)
}

/// Where the settings come from
enum Source {
    File(PathBuf),
    Settings { settings: Box<Settings>, base_dir: PathBuf },
}

/// Builder for a generation run
pub struct GeneratorBuilder {
    source: Source,
    registry: DriverRegistry,
    env: Option<Environ>,
    output_dir: Option<PathBuf>,
}

impl GeneratorBuilder {
    /// Read settings from a TOML file; relative paths in it are resolved
    /// against the file's directory
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self::with_source(Source::File(config_path.as_ref().to_path_buf()))
    }

    /// Use already-loaded settings, resolving relative paths against `base_dir`
    pub fn from_settings(settings: Settings, base_dir: impl AsRef<Path>) -> Self {
        Self::with_source(Source::Settings {
            settings: Box::new(settings),
            base_dir: base_dir.as_ref().to_path_buf(),
        })
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            registry: DriverRegistry::with_builtin(),
            env: None,
            output_dir: None,
        }
    }

    /// Register an additional driver
    pub fn driver(mut self, driver: impl Driver + 'static) -> Self {
        self.registry.register(driver);
        self
    }

    /// Use this environment instead of the process environment
    pub fn environ(mut self, env: Environ) -> Self {
        self.env = Some(env);
        self
    }

    /// Override `output_dir` from the settings
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Generate every configured target, then copy static files
    pub fn generate(self) -> Result<GenerationReport> {
        let (config, data) = self.load()?;

        let report = generate::GenerationPipeline::new(&config, &data).run()?;
        if let Some(static_dir) = &config.static_dir {
            generate::copy_static_files(static_dir, &config.output_dir)?;
        }

        info!("Code generation complete");
        Ok(report)
    }

    /// Build the model and print it instead of generating
    pub fn preview(self, format: PreviewFormat, out: &mut dyn Write) -> Result<()> {
        let (config, data) = self.load()?;
        preview::write_preview(&data, &config.types, format, out)
    }

    /// Compile the configuration, read the schema and build the model
    fn load(self) -> Result<(RunConfig, DbData)> {
        let (mut settings, base_dir) = match self.source {
            Source::File(path) => {
                let settings = Settings::from_file(&path)?;
                let base_dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                (settings, base_dir)
            }
            Source::Settings { settings, base_dir } => (*settings, base_dir),
        };
        if let Some(dir) = self.output_dir {
            settings.output_dir = dir;
        }
        let env = self.env.unwrap_or_else(Environ::capture);

        let config = RunConfig::from_settings(settings, &base_dir, &self.registry, env)?;
        let driver = self.registry.get(&config.settings.db_type)?;

        info!(
            "Reading schemas {:?} with driver {}",
            config.settings.schemas,
            driver.name()
        );
        let info = driver
            .parse(&config.conn_str, &config.settings.schemas, &config.filter)
            .map_err(|e| e.context(format!("reading schema with driver {}", driver.name())))?;
        let data = model::build_data(&info, &config.names, &config.types)?;
        Ok((config, data))
    }
}
