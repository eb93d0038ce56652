//! Shared first stage of every flow: persist the source and run the engine.

use super::classify::{self, Verdict};
use super::runner::{ToolOutput, ToolRunner};
use super::{FlowContext, StageResult};
use crate::error::RenderError;
use crate::progress::RenderState;
use tracing::info;

/// Name of the source file inside the workspace.
pub const SOURCE_FILE: &str = "out.tex";

/// Write `source` to the workspace and typeset it with `engine`.
///
/// Returns the engine's output so later stages can log it if an expected
/// file turns out to be missing.
///
/// The engine runs with `-halt-on-error -interaction=nonstopmode` so a bad
/// document fails fast instead of waiting on stdin. Its output is checked
/// against the signature table even on a zero exit.
pub async fn typeset<R: ToolRunner>(
    cx: &FlowContext<'_, R>,
    engine: &str,
    source: &[u8],
) -> StageResult<ToolOutput> {
    let tex = cx.workspace.file(SOURCE_FILE);
    tokio::fs::write(&tex, source)
        .await
        .map_err(|e| RenderError::SourceWrite {
            path: tex.clone(),
            source: e,
        })?;
    cx.transition(RenderState::SourceWritten);

    info!("Compiling LaTeX with {}", engine);
    let invocation = cx
        .invocation(engine)
        .arg("-halt-on-error")
        .arg("-interaction=nonstopmode")
        .arg("-output-directory")
        .path_arg(cx.workspace.path())
        .path_arg(&tex);
    let output = cx.run_tool(&invocation).await?;

    match classify::classify(&output.text, output.success) {
        Verdict::Passed => {
            cx.transition(RenderState::Typeset);
            Ok(output)
        }
        verdict => {
            cx.reject(&invocation, &output, verdict)?;
            Ok(output)
        }
    }
}
