//! PNG flow: `pdflatex` → Ghostscript `pngmono`, stepping down a DPI ladder.
//!
//! ## Why a ladder?
//!
//! A large page at 600 DPI easily exceeds what PNG decoders and browsers
//! accept. Rather than guessing a resolution up front, each rung of
//! [`crate::config::RenderConfig::dpi_ladder`] is rendered in turn and only
//! the PNG header is decoded to check the size. The first image with both
//! sides within `max_png_dimension` is returned. If every rung is too large
//! the lowest-resolution image is returned anyway, flagged in
//! [`RasterInfo::within_bounds`].
//!
//! A Ghostscript failure ends the flow immediately: it is not a size
//! problem, and a lower resolution would fail the same way.

use super::runner::ToolRunner;
use super::typeset::typeset;
use super::{FlowContext, StageError, StageResult};
use crate::error::RenderError;
use crate::output::{Artifact, ContentType, RasterInfo};
use crate::progress::RenderState;
use std::path::Path;
use tracing::{info, warn};

pub const PDF_FILE: &str = "out.pdf";
pub const PNG_FILE: &str = "out.png";

/// Typeset to PDF and rasterise it to a bilevel PNG.
pub async fn render<R: ToolRunner>(
    cx: &FlowContext<'_, R>,
    source: &[u8],
) -> StageResult<Artifact> {
    let typeset_output = typeset(cx, &cx.config.pdflatex_bin, source).await?;

    let pdf = cx.workspace.file(PDF_FILE);
    cx.require_output(&pdf, &typeset_output).await?;

    info!("Generating PNG");
    let png = cx.workspace.file(PNG_FILE);
    let max = cx.config.max_png_dimension;
    let mut last: Option<RasterInfo> = None;

    for &dpi in &cx.config.dpi_ladder {
        cx.transition(RenderState::Rasterizing { dpi });

        let invocation = cx
            .invocation(&cx.config.ghostscript_bin)
            .arg("-dBATCH")
            .arg("-dNOPAUSE")
            .arg(format!("-r{dpi}"))
            .arg("-sDEVICE=pngmono")
            .arg("-o")
            .path_arg(&png)
            .path_arg(&pdf);
        let output = cx.run_tool(&invocation).await?;
        cx.expect_success(&invocation, &output)?;

        let (width, height) = read_dimensions(&png).await?;
        info!("Generated PNG: dpi={}, width={}, height={}", dpi, width, height);

        let within_bounds = width <= max && height <= max;
        let raster = RasterInfo {
            dpi,
            width,
            height,
            within_bounds,
        };
        if within_bounds {
            let bytes = cx.read_artifact(&png).await?;
            return Ok(Artifact {
                bytes,
                content_type: ContentType::Png,
                raster: Some(raster),
            });
        }

        warn!("PNG too large ({}x{} > {}), trying lower dpi", width, height, max);
        cx.observer.on_raster_oversized(dpi, width, height);
        last = Some(raster);
    }

    // The ladder is validated non-empty, so `last` is always set here.
    let raster = last.ok_or_else(|| {
        StageError::Internal(RenderError::InvalidConfig("DPI ladder is empty".into()))
    })?;
    warn!(
        "PNG still too large at {} dpi ({}x{}), returning it anyway",
        raster.dpi, raster.width, raster.height
    );
    let bytes = cx.read_artifact(&png).await?;
    Ok(Artifact {
        bytes,
        content_type: ContentType::Png,
        raster: Some(raster),
    })
}

/// Read width and height from the PNG header without decoding pixels.
async fn read_dimensions(path: &Path) -> StageResult<(u32, u32)> {
    let owned = path.to_path_buf();
    let dimensions = tokio::task::spawn_blocking(move || image::image_dimensions(&owned))
        .await
        .map_err(|e| RenderError::Internal(format!("Image header task panicked: {e}")))?;

    dimensions.map_err(|e| {
        StageError::Internal(RenderError::ImageHeader {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    })
}
