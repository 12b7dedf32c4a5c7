//! Bounded invocation of external command line tools.
//!
//! Every PipeWire/PulseAudio tool call goes through [`run_tool`] so a hung
//! tool surfaces as [`ToolError::Timeout`] instead of blocking a cycle.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} did not finish within {after:?}")]
    Timeout { program: String, after: Duration },
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stderr, or stdout when stderr is empty. Tools disagree on where they
    /// print diagnostics.
    pub fn message(&self) -> &str {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim()
        } else {
            err
        }
    }
}

/// Run `program` with `args`, killing it if it outlives `timeout`.
pub async fn run_tool<S: AsRef<str>>(program: &str, args: &[S], timeout: Duration) -> Result<ToolOutput, ToolError> {
    let arg_list: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
    debug!(program, args = ?arg_list, "running tool");

    let child = Command::new(program)
        .args(&arg_list)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(ToolError::Timeout {
                program: program.to_string(),
                after: timeout,
            })
        }
    };

    Ok(ToolOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
