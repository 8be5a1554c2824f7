//! Default configuration values - single source of truth

/// Config file read when `--config` is not given
pub const CONFIG_FILE: &str = "rdbi-gen.toml";

/// Driver used when `db_type` is not set
pub const DB_TYPE: &str = "ddl";

/// Name conversion template (names are used as-is)
pub const NAME_CONVERSION: &str = "{{ name }}";

/// Output directory, relative to the config file
pub const OUTPUT_DIR: &str = ".";

/// Base directory for contents templates, relative to the config file
pub const TEMPLATE_DIR: &str = ".";

/// Seconds a post-run command may take before it is killed
pub const POST_RUN_TIMEOUT_SECS: u64 = 10;

/// Seconds an external template engine invocation may take
pub const ENGINE_TIMEOUT_SECS: u64 = 60;

/// Environment variable holding the generated file's path for post-run commands
pub const GEN_FILE_VAR: &str = "RDBI_GEN_FILE";
