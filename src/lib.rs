//! # latex-render
//!
//! Render LaTeX source to SVG, PDF, or PNG with an installed TeX toolchain.
//!
//! ## Why this crate?
//!
//! Shelling out to `latex` is easy; doing it safely for many callers at once
//! is not. TeX writes its auxiliary files next to the source, fails with
//! hundreds of lines of log, and happily produces a 200 000 pixel wide page.
//! This crate gives each request its own scratch directory, runs the tools
//! in a fixed order, turns TeX's fatal messages into a small set of error
//! codes, and walks a DPI ladder until a raster fits.
//!
//! ## Pipeline Overview
//!
//! ```text
//! LaTeX source
//!  │
//!  ├─ 1. Workspace  private temp dir (svg-*, pdf-*, png-*)
//!  ├─ 2. Typeset    latex (SVG) or pdflatex (PDF, PNG), halt on first error
//!  ├─ 3. Classify   DIM_TOO_LARGE / ARITHMETIC_OVERFLOW / TEX_CAPACITY_EXCEEDED / LATEX_ERROR
//!  ├─ 4. Convert    dvisvgm │ gs pdfwrite │ gs pngmono @ 600 → 300 → … → 16 dpi
//!  └─ 5. Teardown   workspace removed on every path, then the result is reported
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use latex_render::{ConversionResult, OutputFormat, RenderConfig, Renderer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let renderer = Renderer::new(RenderConfig::default())?;
//!     let source = r"\documentclass[preview]{standalone}
//! \begin{document}$\int_0^1 x\,dx = \frac12$\end{document}";
//!
//!     match renderer.render(OutputFormat::Png, source).await {
//!         ConversionResult::Success(png) => {
//!             let raster = png.raster.expect("PNG output carries raster info");
//!             println!("{}x{} @ {} dpi", raster.width, raster.height, raster.dpi);
//!         }
//!         failure => eprintln!(
//!             "{} {:?}: {}",
//!             failure.status_code(),
//!             failure.error_code(),
//!             failure.public_message().unwrap_or_default()
//!         ),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Builds the `latex-render` binary (clap, indicatif, futures, serde_json) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! latex-render = { version = "0.3", default-features = false }
//! ```
//!
//! ## Required Tools
//!
//! | Role | Default binary | Used for |
//! |------|----------------|----------|
//! | latex | `latex` | SVG flow (DVI output) |
//! | pdflatex | `pdflatex` | PDF and PNG flows |
//! | dvisvgm | `dvisvgm` | DVI → SVG |
//! | ghostscript | `gs` (`gswin64c` on Windows) | PDF compression, PNG rasterisation |
//!
//! [`Renderer::check_toolchain`] reports which of them are reachable.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    RenderConfig, RenderConfigBuilder, DEFAULT_DPI_LADDER, DEFAULT_MAX_PNG_DIMENSION,
    DEFAULT_PDF_COMPATIBILITY,
};
pub use convert::{render_sync, Renderer, ToolStatus, EMPTY_SOURCE_MESSAGE};
pub use error::{ErrorCode, RenderError, ERROR_CODE_HEADER};
pub use output::{
    Artifact, ContentType, ConversionResult, OutputFormat, RasterInfo, RenderReport,
};
pub use pipeline::classify::UNEXPECTED_MESSAGE;
pub use pipeline::runner::{SystemRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use pipeline::workspace::Workspace;
pub use progress::{NoopObserver, RenderObserver, RenderState, SharedObserver};
