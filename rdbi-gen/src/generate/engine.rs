//! External template engine
//!
//! Each (unit, target) pair is one request: the unit's data document is
//! serialized to JSON and handed to a child process, either as a temp file
//! path or on stdin. The rendered output is either written by the child to
//! the output path or read from its stdout.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tempfile::NamedTempFile;
use tera::Context;
use tracing::debug;

use super::process::{drain, wait_with_timeout};
use super::writer::{create_dir_all, AtomicFileWriter};
use crate::env::Environ;
use crate::error::{GenError, Result};
use crate::template::TemplateSet;

/// A configured external rendering program
#[derive(Debug, Clone)]
pub struct ExternalEngine {
    tokens: TemplateSet,
    token_count: usize,
    use_stdin: bool,
    use_stdout: bool,
    timeout: Duration,
}

impl ExternalEngine {
    /// Compile the command line; each token is a template over `data`,
    /// `template` and `output`
    pub fn new(
        command_line: &[String],
        use_stdin: bool,
        use_stdout: bool,
        timeout: Duration,
    ) -> Result<Self> {
        if command_line.is_empty() {
            return Err(GenError::Config(
                "template_engine.command_line is empty".into(),
            ));
        }
        let mut tokens = TemplateSet::new();
        for (i, token) in command_line.iter().enumerate() {
            tokens.add(&token_name(i), token)?;
        }
        Ok(Self {
            tokens,
            token_count: command_line.len(),
            use_stdin,
            use_stdout,
            timeout,
        })
    }

    /// Render `template` for `data` into `output`
    pub fn run<T>(&self, data: &T, template: &Path, output: &Path, env: &Environ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(data)?;

        // Kept alive until the child has exited
        let data_file = if self.use_stdin {
            None
        } else {
            let mut file = NamedTempFile::new()?;
            file.write_all(&payload)?;
            file.flush()?;
            Some(file)
        };

        let mut context = Context::new();
        context.insert(
            "data",
            &data_file
                .as_ref()
                .map(|f| f.path().to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        context.insert("template", &template.to_string_lossy());
        context.insert("output", &output.to_string_lossy());

        let argv = (0..self.token_count)
            .map(|i| self.tokens.render(&token_name(i), &context))
            .collect::<Result<Vec<_>>>()?;
        let command_line = argv.join(" ");
        let engine_err = |message: String| GenError::Engine {
            command: command_line.clone(),
            message,
        };
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| engine_err("empty command".into()))?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }

        debug!("Running template engine: {}", command_line);
        let mut child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter())
            .stdin(if self.use_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(if self.use_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| engine_err(e.to_string()))?;

        let feeder = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                // A child that stops reading early closes the pipe; its exit
                // status is what gets reported
                let _ = stdin.write_all(&payload);
            })
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_timeout(&mut child, self.timeout)?;
        if let Some(feeder) = feeder {
            let _ = feeder.join();
        }
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        match status {
            None => {
                return Err(engine_err(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
            Some(status) if !status.success() => {
                return Err(engine_err(format!(
                    "exited with {}: {}",
                    status,
                    String::from_utf8_lossy(&stderr).trim()
                )))
            }
            Some(_) => {}
        }

        if self.use_stdout {
            AtomicFileWriter.write(output, &stdout)?;
        }
        Ok(())
    }
}

fn token_name(index: usize) -> String {
    format!("command_line[{}]", index)
}
