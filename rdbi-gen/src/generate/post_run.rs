//! Post-generation hook

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;

use super::process::wait_with_timeout;
use crate::config::defaults;
use crate::env::Environ;
use crate::error::{GenError, Result};

/// Runs the configured command after each generated file is written.
///
/// Every token is `$VAR`-expanded against the run environment plus
/// `RDBI_GEN_FILE`, bound to the written file. The child shares this
/// process's stdout and stderr.
#[derive(Debug, Clone)]
pub struct PostRunExecutor {
    command: Vec<String>,
    timeout: Duration,
}

impl PostRunExecutor {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self> {
        if command.is_empty() {
            return Err(GenError::Config("post_run command is empty".into()));
        }
        Ok(Self { command, timeout })
    }

    pub fn run(&self, file: &Path, env: &Environ) -> Result<()> {
        let env = env.with_var(defaults::GEN_FILE_VAR, file.to_string_lossy());
        let argv: Vec<String> = self.command.iter().map(|t| env.expand(t)).collect();
        let command_line = argv.join(" ");
        let (program, args) = argv.split_first().ok_or_else(|| GenError::PostRun {
            command: command_line.clone(),
            message: "empty command".into(),
        })?;

        debug!("Running post-run command: {}", command_line);
        let mut child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| GenError::PostRun {
                command: command_line.clone(),
                message: e.to_string(),
            })?;

        match wait_with_timeout(&mut child, self.timeout)? {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(GenError::PostRun {
                command: command_line,
                message: format!("exited with {}", status),
            }),
            None => Err(GenError::PostRunTimeout {
                command: command_line,
                timeout: self.timeout,
            }),
        }
    }
}
