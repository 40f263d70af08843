use std::path::Path;
use std::process::Stdio;

use scpgate_common::TransferError;
use tokio::process::Command;
use tracing::*;

/// Runs the configured post-upload command once per uploaded file, with
/// the file's absolute path as the last argument.
#[derive(Debug, Clone)]
pub struct HookRunner {
    program: String,
    args: Vec<String>,
}

impl HookRunner {
    /// `None` for an empty command, which disables the hook.
    pub fn new(command: Vec<String>) -> Option<Self> {
        let mut command = command.into_iter();
        let program = command.next()?;
        Some(HookRunner {
            program,
            args: command.collect(),
        })
    }

    /// Output is logged, never returned to the peer.
    pub async fn run(&self, path: &Path) -> Result<(), TransferError> {
        debug!(hook = %self.program, ?path, "Running post-upload hook");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TransferError::Hook {
                program: self.program.clone(),
                source,
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(hook = %self.program, "{line}");
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!(hook = %self.program, "{line}");
        }

        if !output.status.success() {
            return Err(TransferError::HookStatus {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }
        Ok(())
    }
}
