//! Pipeline stages for LaTeX rendering.
//!
//! Each submodule implements one concern. Keeping them apart lets the
//! classifier be tested on captured logs and the flows be tested with an
//! injected [`runner::ToolRunner`], with no TeX installation involved.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ typeset ──▶ classify ──▶ svg | pdf | png ──▶ artifact
//!  (tempdir)    (latex)     (rules)      (dvisvgm / gs)
//! ```
//!
//! 1. [`workspace`]: allocate and tear down the per-request directory
//! 2. [`runner`]   : run a tool, capture combined output and exit status
//! 3. [`classify`] : turn TeX output into an error code, or pass
//! 4. [`typeset`]  : persist the source, run the engine, classify
//! 5. [`svg`], [`pdf`], [`png`]: the format-specific conversion step
//!
//! Stages return [`StageResult`]; the first non-success short-circuits the
//! flow through `?`.

pub mod classify;
pub mod pdf;
pub mod png;
pub mod runner;
pub mod svg;
pub mod typeset;
pub mod workspace;

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::output::OutputFormat;
use crate::progress::{RenderObserver, RenderState};
use classify::{Classification, Verdict};
use runner::{ToolInvocation, ToolOutput, ToolRunner};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, warn};
use workspace::Workspace;

/// Why a stage stopped the flow.
#[derive(Debug)]
pub enum StageError {
    /// Recognised failure, safe to report to the client.
    Classified(Classification),
    /// A tool failed for reasons its output does not explain.
    Unexpected { detail: String },
    /// Filesystem or process failure outside any tool's control.
    Internal(RenderError),
}

impl From<RenderError> for StageError {
    fn from(e: RenderError) -> Self {
        StageError::Internal(e)
    }
}

pub type StageResult<T> = Result<T, StageError>;

/// Everything a flow needs for one request.
pub struct FlowContext<'a, R> {
    pub runner: &'a R,
    pub config: &'a RenderConfig,
    pub observer: &'a dyn RenderObserver,
    pub workspace: &'a Workspace,
    pub format: OutputFormat,
}

impl<R: ToolRunner> FlowContext<'_, R> {
    pub fn transition(&self, state: RenderState) {
        debug!("[{}] {}", self.workspace.name(), state);
        self.observer.on_transition(self.format, state);
    }

    /// Start building an invocation that runs inside the workspace.
    pub fn invocation(&self, tool: &str) -> ToolInvocation {
        ToolInvocation::new(tool, self.workspace.path())
    }

    /// Run a tool, timing it and reporting the outcome to the observer.
    pub async fn run_tool(&self, invocation: &ToolInvocation) -> StageResult<ToolOutput> {
        let started = Instant::now();
        let output = self.runner.run(invocation).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            "{} exited {:?} after {}ms",
            invocation.tool, output.exit_code, elapsed_ms
        );
        self.observer
            .on_tool_complete(&invocation.tool, output.success, elapsed_ms);
        Ok(output)
    }

    /// Turn a conversion tool's failed exit into a stage error.
    ///
    /// Conversion tools go through the same classifier as the engine; in
    /// practice their output carries no TeX markers and ends up unexpected.
    pub fn expect_success(
        &self,
        invocation: &ToolInvocation,
        output: &ToolOutput,
    ) -> StageResult<()> {
        if output.success {
            return Ok(());
        }
        self.reject(invocation, output, classify::classify(&output.text, false))
    }

    /// Map a non-passing verdict to a stage error, logging accordingly.
    pub fn reject(
        &self,
        invocation: &ToolInvocation,
        output: &ToolOutput,
        verdict: Verdict,
    ) -> StageResult<()> {
        match verdict {
            Verdict::Passed => Ok(()),
            Verdict::Classified(c) => {
                warn!("[{}] {}: {}", self.workspace.name(), c.code, c.message);
                debug!(tool = %invocation.tool, output = %output.text, "Classified tool output");
                Err(StageError::Classified(c))
            }
            Verdict::Unexpected => {
                error!(
                    tool = %invocation.tool,
                    exit_code = ?output.exit_code,
                    output = %output.text,
                    "Unexpected {} error",
                    invocation.tool
                );
                Err(StageError::Unexpected {
                    detail: format!(
                        "{} exited with {:?} and no recognisable error",
                        invocation.tool, output.exit_code
                    ),
                })
            }
        }
    }

    /// Fail unless a tool that reported success actually wrote `path`.
    pub async fn require_output(&self, path: &Path, produced_by: &ToolOutput) -> StageResult<()> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => Ok(()),
            _ => {
                error!(output = %produced_by.text, "Expected {} was not produced", path.display());
                Err(RenderError::MissingOutput {
                    path: path.to_path_buf(),
                }
                .into())
            }
        }
    }

    /// Read an artifact back from the workspace.
    pub async fn read_artifact(&self, path: &Path) -> StageResult<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| {
            RenderError::ArtifactRead {
                path: path.to_path_buf(),
                source: e,
            }
            .into()
        })
    }
}
