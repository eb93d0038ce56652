//! SVG flow: `latex` → DVI → `dvisvgm`.

use super::runner::ToolRunner;
use super::typeset::typeset;
use super::{FlowContext, StageResult};
use crate::output::{Artifact, ContentType};
use tracing::info;

pub const DVI_FILE: &str = "out.dvi";
pub const SVG_FILE: &str = "out.svg";

/// Typeset to DVI and convert it to a tightly cropped SVG.
///
/// dvisvgm runs with a preview bounding box, no bitmap fallback, WOFF2
/// embedded fonts, path optimisation and relative coordinates.
pub async fn render<R: ToolRunner>(
    cx: &FlowContext<'_, R>,
    source: &[u8],
) -> StageResult<Artifact> {
    let typeset_output = typeset(cx, &cx.config.latex_bin, source).await?;

    // latex can exit 0 without shipping a page.
    let dvi = cx.workspace.file(DVI_FILE);
    cx.require_output(&dvi, &typeset_output).await?;

    info!("Compiling DVI to SVG");
    let svg = cx.workspace.file(SVG_FILE);
    let invocation = cx
        .invocation(&cx.config.dvisvgm_bin)
        .arg("--bbox=preview")
        .arg("--bitmap-format=none")
        .arg("--font-format=woff2")
        .arg("--optimize")
        .arg("--relative")
        .arg("-o")
        .path_arg(&svg)
        .path_arg(&dvi);
    let output = cx.run_tool(&invocation).await?;
    cx.expect_success(&invocation, &output)?;

    let bytes = cx.read_artifact(&svg).await?;
    Ok(Artifact {
        bytes,
        content_type: ContentType::Svg,
        raster: None,
    })
}
