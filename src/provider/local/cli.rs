// ABOUTME: Captured-output runner for the local container engine binary.
// ABOUTME: Non-zero exit codes map to ProviderError with stderr attached.

use crate::provider::error::{CommandFailedSnafu, ProviderError, SpawnSnafu};
use snafu::ResultExt;
use std::process::Stdio;
use tokio::process::Command;

/// Captured output of one engine invocation.
#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Shell-out boundary to the engine binary (`docker` by default, `podman`
/// works as well). Container-engine semantics stay in the external binary;
/// this type only runs it and interprets exit codes.
#[derive(Debug, Clone)]
pub struct EngineCli {
    binary: String,
}

impl EngineCli {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run one engine command and capture its output.
    ///
    /// # Errors
    ///
    /// `Spawn` if the binary cannot be executed, `CommandFailed` with the
    /// exit code and stderr when the engine reports failure.
    pub async fn run(&self, args: &[&str]) -> Result<CliOutput, ProviderError> {
        tracing::debug!(binary = %self.binary, ?args, "running engine command");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context(SpawnSnafu {
                binary: self.binary.clone(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return CommandFailedSnafu {
                binary: self.binary.clone(),
                subcommand: args.first().copied().unwrap_or_default().to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            }
            .fail();
        }

        Ok(CliOutput { stdout, stderr })
    }

    /// Run a command where failure only means "not present" (inspects,
    /// best-effort removals). Returns whether the command succeeded.
    pub async fn run_check(&self, args: &[&str]) -> bool {
        matches!(self.run(args).await, Ok(_))
    }
}
