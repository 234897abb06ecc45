//! External business script run as a subprocess.
//!
//! The configured command gets the input file path as its last argument
//! and the credential table exported as its environment, so an unmodified
//! legacy script can keep reading `DOMAIN_ONE_USER` and friends. The script
//! reports its output file by printing the path as the last non-empty line
//! of stdout; its exit code is the run's status code.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::{CredentialEnv, ScriptResult};
use crate::error::{Stage, WrapperError};
use crate::script::BusinessScript;

/// Business script launched as an external command
pub struct CommandScript {
    /// Program followed by its fixed arguments
    command: Vec<String>,
    /// Directory the script runs in; relative output paths resolve here
    working_dir: PathBuf,
    limit: Duration,
}

impl CommandScript {
    pub fn new(command: Vec<String>, working_dir: impl Into<PathBuf>, limit: Duration) -> Self {
        Self {
            command,
            working_dir: working_dir.into(),
            limit,
        }
    }
}

#[async_trait]
impl BusinessScript for CommandScript {
    fn name(&self) -> &str {
        "command"
    }

    async fn run(&self, input: &Path, env: &CredentialEnv) -> Result<ScriptResult, WrapperError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| WrapperError::ScriptExecutionFailed("empty script command".to_string()))?;

        info!(program = %program, input = %input.display(), "Launching business script");

        let child = Command::new(program)
            .args(args)
            .arg(input)
            .envs(env.iter())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WrapperError::ScriptExecutionFailed(format!("failed to spawn '{}': {}", program, e))
            })?;

        let output = timeout(self.limit, child.wait_with_output())
            .await
            .map_err(|_| WrapperError::Timeout {
                stage: Stage::Script,
                seconds: self.limit.as_secs(),
            })?
            .map_err(|e| {
                WrapperError::ScriptExecutionFailed(format!("failed to wait for '{}': {}", program, e))
            })?;

        let status_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "Business script stderr");
        }

        let reported = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .ok_or_else(|| {
                WrapperError::ScriptExecutionFailed(format!(
                    "script exited with code {} without reporting an output file: {}",
                    status_code,
                    stderr.trim()
                ))
            })?;

        let output_file = resolve_output(&self.working_dir, reported);
        if !output_file.exists() {
            return Err(WrapperError::ScriptExecutionFailed(format!(
                "script reported output file {} which does not exist (exit code {})",
                output_file.display(),
                status_code
            )));
        }

        if status_code != 0 {
            warn!(status_code, "Business script finished with non-zero status");
        }

        Ok(ScriptResult {
            output_file,
            status_code,
        })
    }
}

fn resolve_output(working_dir: &Path, reported: &str) -> PathBuf {
    let path = Path::new(reported);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}
