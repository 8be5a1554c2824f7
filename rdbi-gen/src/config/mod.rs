//! Configuration: the TOML file model and its compiled form

pub mod defaults;
mod run_config;
mod settings;

pub use run_config::{OutputTarget, RunConfig, UnitKind};
pub use settings::{EngineSettings, Settings};
