//! CLI entry point for rdbi-gen

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdbi_gen::config::{defaults, Settings};
use rdbi_gen::{GeneratorBuilder, PreviewFormat};

#[derive(Parser)]
#[command(name = "rdbi-gen")]
#[command(about = "Render templates from a database schema: one file per schema, table and enum")]
#[command(version)]
struct Cli {
    /// Path to configuration file (TOML format)
    #[arg(short, long, default_value = defaults::CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level (RUST_LOG and log_level take precedence)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate all configured files
    Gen {
        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the schema model instead of generating
    Preview {
        /// tabular, yaml, json or types
        #[arg(short, long, default_value_t = PreviewFormat::Tabular)]
        format: PreviewFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (before logging, so we can use log_level)
    let settings = Settings::from_file(&cli.config)?;

    // Initialize logging
    // Priority: RUST_LOG env var > config.log_level > --verbose > info
    let default_level = if cli.verbose { "debug" } else { "info" };
    let log_level = settings.log_level.as_deref().unwrap_or(default_level);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let base_dir = cli
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let builder = GeneratorBuilder::from_settings(settings, base_dir);

    match cli.command {
        Commands::Gen { output } => {
            // A command-line path is relative to the working directory
            let builder = match output {
                Some(dir) => builder.output_dir(std::env::current_dir()?.join(dir)),
                None => builder,
            };
            let report = builder
                .generate()
                .with_context(|| format!("generation from {} failed", cli.config.display()))?;
            info!(
                "Code generation completed successfully: {} written, {} skipped",
                report.written.len(),
                report.skipped.len()
            );
        }
        Commands::Preview { format } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            builder.preview(format, &mut out)?;
        }
    }

    Ok(())
}
