//! External tool invocation.
//!
//! The pipeline never touches `std::process` directly; it describes each
//! call as a [`ToolInvocation`] and hands it to a [`ToolRunner`]. The
//! production runner spawns the real binary, tests inject a fake that
//! writes fixture files instead.
//!
//! A non-zero exit is an ordinary [`ToolOutput`] with `success == false`.
//! Only failing to run the tool at all (missing binary, spawn error,
//! deadline) is a [`RenderError`].

use crate::error::RenderError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// A single call to an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: String,
    pub args: Vec<String>,
    /// Directory the tool runs in (the request workspace).
    pub working_dir: PathBuf,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument using forward slashes.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(slash_path(path))
    }

    /// Command line for log messages.
    pub fn display(&self) -> String {
        let mut s = self.tool.clone();
        for a in &self.args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }
}

/// What a tool run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// `true` when the process exited with status 0.
    pub success: bool,
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// stdout followed by stderr, lossily decoded.
    pub text: String,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            text: text.into(),
        }
    }

    pub fn failed(code: i32, text: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(code),
            text: text.into(),
        }
    }
}

/// Runs a [`ToolInvocation`] to completion.
pub trait ToolRunner: Send + Sync {
    fn run(
        &self,
        invocation: &ToolInvocation,
    ) -> impl Future<Output = Result<ToolOutput, RenderError>> + Send;
}

/// Spawns the real binary with `tokio::process`.
///
/// The child is spawned with `kill_on_drop`, so dropping the future (a
/// timeout, or the caller abandoning the request) also kills the process.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any tool still running after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl ToolRunner for SystemRunner {
    fn run(
        &self,
        invocation: &ToolInvocation,
    ) -> impl Future<Output = Result<ToolOutput, RenderError>> + Send {
        let mut command = Command::new(&invocation.tool);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let tool = invocation.tool.clone();
        let timeout = self.timeout;
        debug!("Running: {}", invocation.display());

        async move {
            let run = command.output();
            let output = match timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(res) => res,
                    Err(_) => {
                        return Err(RenderError::ToolTimeout {
                            tool,
                            secs: limit.as_secs(),
                        })
                    }
                },
                None => run.await,
            };

            let output = output.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::ToolNotFound { tool: tool.clone() }
                } else {
                    RenderError::ToolSpawn {
                        tool: tool.clone(),
                        source: e,
                    }
                }
            })?;

            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));

            Ok(ToolOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                text,
            })
        }
    }
}

/// Render a path with `/` separators, as TeX tools expect on every platform.
pub fn slash_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '\\' {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}
