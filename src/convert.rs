//! Render entry points.
//!
//! [`Renderer`] owns the configuration and a [`ToolRunner`] and turns one
//! LaTeX source into one [`ConversionResult`]. Each call is independent:
//! it gets its own workspace, runs its tools strictly one after another,
//! and removes the workspace before reporting the terminal state. A single
//! renderer can be shared (`Arc<Renderer>`) across any number of
//! concurrent requests without locking.

use crate::config::RenderConfig;
use crate::error::{ErrorCode, RenderError};
use crate::output::{Artifact, ConversionResult, OutputFormat};
use crate::pipeline::runner::{SystemRunner, ToolInvocation, ToolRunner};
use crate::pipeline::workspace::Workspace;
use crate::pipeline::{pdf, png, svg, FlowContext, StageError, StageResult};
use crate::progress::{NoopObserver, RenderObserver, RenderState};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Message returned for a blank source.
pub const EMPTY_SOURCE_MESSAGE: &str = "Empty LaTeX source";

/// Renders LaTeX source to SVG, PDF, or PNG.
///
/// # Example
/// ```rust,no_run
/// use latex_render::{ConversionResult, RenderConfig, Renderer};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = Renderer::new(RenderConfig::default())?;
/// let source = r"\documentclass[preview]{standalone}\begin{document}$e^{i\pi}+1=0$\end{document}";
/// match renderer.render_svg(source).await {
///     ConversionResult::Success(svg) => println!("{} bytes of SVG", svg.bytes.len()),
///     other => eprintln!("{:?}: {:?}", other.error_code(), other.public_message()),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Renderer<R = SystemRunner> {
    config: RenderConfig,
    runner: R,
}

impl Renderer<SystemRunner> {
    /// Renderer spawning the real toolchain.
    ///
    /// `tool_timeout_secs` from the config becomes the per-tool deadline.
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        let runner = match config.tool_timeout_secs {
            Some(secs) => SystemRunner::with_timeout(Duration::from_secs(secs)),
            None => SystemRunner::new(),
        };
        Self::with_runner(config, runner)
    }
}

impl<R: ToolRunner> Renderer<R> {
    /// Renderer using a caller-supplied runner.
    pub fn with_runner(config: RenderConfig, runner: R) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub async fn render_svg(&self, source: impl AsRef<[u8]>) -> ConversionResult {
        self.render(OutputFormat::Svg, source).await
    }

    pub async fn render_pdf(&self, source: impl AsRef<[u8]>) -> ConversionResult {
        self.render(OutputFormat::Pdf, source).await
    }

    pub async fn render_png(&self, source: impl AsRef<[u8]>) -> ConversionResult {
        self.render(OutputFormat::Png, source).await
    }

    /// Render `source` to `format`.
    ///
    /// Never fails at the call level: every outcome, including internal
    /// filesystem errors, is one of the three [`ConversionResult`] variants.
    pub async fn render(
        &self,
        format: OutputFormat,
        source: impl AsRef<[u8]>,
    ) -> ConversionResult {
        let source = source.as_ref();
        let started = Instant::now();
        let observer = self.observer();
        info!("Request received: /{} ({} bytes)", format, source.len());
        observer.on_render_start(format, source.len());

        let result = if self.config.reject_empty_source && is_blank(source) {
            ConversionResult::ClassifiedFailure {
                code: ErrorCode::LatexError,
                message: EMPTY_SOURCE_MESSAGE.to_string(),
            }
        } else {
            into_result(self.run_in_workspace(format, source).await)
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            ConversionResult::Success(a) => info!(
                "{} generated successfully: {} bytes in {}ms",
                format.to_string().to_uppercase(),
                a.bytes.len(),
                elapsed_ms
            ),
            ConversionResult::ClassifiedFailure { code, message } => {
                warn!("{} request rejected: {} ({})", format, code, message)
            }
            ConversionResult::UnexpectedFailure { detail } => {
                error!("{} request failed: {}", format, detail)
            }
        }

        observer.on_transition(format, terminal_state(&result));
        observer.on_render_complete(format, &result, elapsed_ms);
        result
    }

    /// Render and, on success, write the artifact to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    /// Failed renders leave `output_path` untouched.
    pub async fn render_to_file(
        &self,
        format: OutputFormat,
        source: impl AsRef<[u8]>,
        output_path: impl AsRef<Path>,
    ) -> Result<ConversionResult, RenderError> {
        let result = self.render(format, source).await;
        if let ConversionResult::Success(ref artifact) = result {
            write_atomic(output_path.as_ref(), artifact).await?;
        }
        Ok(result)
    }

    /// Check every configured tool with `--version`.
    ///
    /// Does not touch any workspace; useful as a startup or health check.
    pub async fn check_toolchain(&self) -> Vec<ToolStatus> {
        let dir = std::env::temp_dir();
        let tools = [
            ("latex", &self.config.latex_bin),
            ("pdflatex", &self.config.pdflatex_bin),
            ("dvisvgm", &self.config.dvisvgm_bin),
            ("ghostscript", &self.config.ghostscript_bin),
        ];

        let mut statuses = Vec::with_capacity(tools.len());
        for (role, bin) in tools {
            let invocation = ToolInvocation::new(bin.as_str(), &dir).arg("--version");
            let status = match self.runner.run(&invocation).await {
                Ok(out) if out.success => ToolStatus {
                    role,
                    tool: bin.clone(),
                    available: true,
                    version: out
                        .text
                        .lines()
                        .map(str::trim)
                        .find(|l| !l.is_empty())
                        .map(str::to_string),
                    problem: None,
                },
                Ok(out) => ToolStatus {
                    role,
                    tool: bin.clone(),
                    available: false,
                    version: None,
                    problem: Some(format!("exited with {:?}", out.exit_code)),
                },
                Err(e) => ToolStatus {
                    role,
                    tool: bin.clone(),
                    available: false,
                    version: None,
                    problem: Some(e.to_string()),
                },
            };
            statuses.push(status);
        }
        statuses
    }

    fn observer(&self) -> &dyn RenderObserver {
        match self.config.observer.as_deref() {
            Some(observer) => observer,
            None => &NoopObserver,
        }
    }

    /// Allocate the workspace, run the flow, tear the workspace down.
    async fn run_in_workspace(
        &self,
        format: OutputFormat,
        source: &[u8],
    ) -> StageResult<Artifact> {
        let workspace = Workspace::create(&self.config.workspace_root, format.workspace_prefix())?;

        let outcome = {
            let cx = FlowContext {
                runner: &self.runner,
                config: &self.config,
                observer: self.observer(),
                workspace: &workspace,
                format,
            };
            cx.transition(RenderState::WorkspaceReady);
            match format {
                OutputFormat::Svg => svg::render(&cx, source).await,
                OutputFormat::Pdf => pdf::render(&cx, source).await,
                OutputFormat::Png => png::render(&cx, source).await,
            }
        };

        if let Err(e) = workspace.destroy() {
            warn!("{}", e);
        }
        outcome
    }
}

/// Availability of one external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    /// What the pipeline uses it for (`latex`, `ghostscript`, …).
    pub role: &'static str,
    /// Configured binary name.
    pub tool: String,
    pub available: bool,
    /// First line of `--version` output.
    pub version: Option<String>,
    pub problem: Option<String>,
}

/// Synchronous wrapper around [`Renderer::render`].
///
/// Creates a temporary tokio runtime internally.
pub fn render_sync(
    config: &RenderConfig,
    format: OutputFormat,
    source: impl AsRef<[u8]>,
) -> Result<ConversionResult, RenderError> {
    let renderer = Renderer::new(config.clone())?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| RenderError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(renderer.render(format, source)))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn is_blank(source: &[u8]) -> bool {
    String::from_utf8_lossy(source).trim().is_empty()
}

fn into_result(outcome: StageResult<Artifact>) -> ConversionResult {
    match outcome {
        Ok(artifact) => ConversionResult::Success(artifact),
        Err(StageError::Classified(c)) => ConversionResult::ClassifiedFailure {
            code: c.code,
            message: c.message,
        },
        Err(StageError::Unexpected { detail }) => ConversionResult::UnexpectedFailure { detail },
        Err(StageError::Internal(e)) => ConversionResult::UnexpectedFailure {
            detail: e.to_string(),
        },
    }
}

fn terminal_state(result: &ConversionResult) -> RenderState {
    match result {
        ConversionResult::Success(_) => RenderState::Converted,
        ConversionResult::ClassifiedFailure { .. } => RenderState::ClassifiedFailure,
        ConversionResult::UnexpectedFailure { .. } => RenderState::UnexpectedFailure,
    }
}

async fn write_atomic(path: &Path, artifact: &Artifact) -> Result<(), RenderError> {
    let fail = |e| RenderError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", artifact.content_type.extension()));
    tokio::fs::write(&tmp_path, &artifact.bytes)
        .await
        .map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}
