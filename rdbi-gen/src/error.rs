//! Error types for rdbi-gen

use std::time::Duration;

use thiserror::Error;

/// Result type alias for rdbi-gen operations
pub type Result<T> = std::result::Result<T, GenError>;

/// Errors that abort a generation run
///
/// Recoverable conditions (unmapped types, dangling index or foreign-key
/// references) are logged and never surface as a `GenError`.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Driver {driver} failed: {message}")]
    Driver { driver: String, message: String },

    #[error("Unknown database driver: {0}")]
    UnknownDriver(String),

    #[error("Name conversion failed for {name:?}: {message}")]
    NameConversion { name: String, message: String },

    #[error("Failed to parse template {template:?}: {message}")]
    TemplateParse { template: String, message: String },

    #[error("Failed to render template {template:?}: {message}")]
    TemplateRender { template: String, message: String },

    #[error("Template engine command {command:?} failed: {message}")]
    Engine { command: String, message: String },

    #[error("Post-run command {command:?} failed: {message}")]
    PostRun { command: String, message: String },

    #[error("Post-run command {command:?} timed out after {timeout:?}")]
    PostRunTimeout { command: String, timeout: Duration },

    #[error("Duplicate table {table:?} in schema {schema:?}")]
    DuplicateTable { schema: String, table: String },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<GenError>,
    },
}

impl GenError {
    /// Wrap this error with a description of what was being processed
    pub fn context(self, context: impl Into<String>) -> Self {
        GenError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a `TemplateRender` error, keeping tera's full cause chain
    pub(crate) fn render(template: impl Into<String>, err: &tera::Error) -> Self {
        GenError::TemplateRender {
            template: template.into(),
            message: error_chain(err),
        }
    }

    /// Build a `TemplateParse` error, keeping tera's full cause chain
    pub(crate) fn parse(template: impl Into<String>, err: &tera::Error) -> Self {
        GenError::TemplateParse {
            template: template.into(),
            message: error_chain(err),
        }
    }
}

/// Flatten an error and its sources into one line.
///
/// Tera reports the interesting part (missing variable, bad filter argument)
/// in the source chain, not in the top-level message.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<sqlparser::parser::ParserError> for GenError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        GenError::Driver {
            driver: "ddl".into(),
            message: err.to_string(),
        }
    }
}
