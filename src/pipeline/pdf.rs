//! PDF flow: `pdflatex` → Ghostscript `pdfwrite` recompression.

use super::runner::ToolRunner;
use super::typeset::typeset;
use super::{FlowContext, StageResult};
use crate::output::{Artifact, ContentType};
use tracing::info;

pub const PDF_FILE: &str = "out.pdf";
pub const COMPRESSED_PDF_FILE: &str = "out-comp.pdf";

/// Typeset to PDF and pass it through Ghostscript once to shrink it.
pub async fn render<R: ToolRunner>(
    cx: &FlowContext<'_, R>,
    source: &[u8],
) -> StageResult<Artifact> {
    let typeset_output = typeset(cx, &cx.config.pdflatex_bin, source).await?;

    let pdf = cx.workspace.file(PDF_FILE);
    cx.require_output(&pdf, &typeset_output).await?;

    info!("Compressing PDF");
    let compressed = cx.workspace.file(COMPRESSED_PDF_FILE);
    let invocation = cx
        .invocation(&cx.config.ghostscript_bin)
        .arg("-dBATCH")
        .arg(format!(
            "-dCompatibilityLevel={}",
            cx.config.pdf_compatibility_level
        ))
        .arg("-dNOPAUSE")
        .arg("-sDEVICE=pdfwrite")
        .arg("-o")
        .path_arg(&compressed)
        .path_arg(&pdf);
    let output = cx.run_tool(&invocation).await?;
    cx.expect_success(&invocation, &output)?;

    let bytes = cx.read_artifact(&compressed).await?;
    Ok(Artifact {
        bytes,
        content_type: ContentType::Pdf,
        raster: None,
    })
}
