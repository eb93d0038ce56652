//! Configuration for LaTeX rendering.
//!
//! Every knob lives in [`RenderConfig`], built via its
//! [`RenderConfigBuilder`]. Defaults reproduce the stock toolchain
//! (`latex`, `pdflatex`, `dvisvgm`, Ghostscript) with the standard DPI
//! ladder, so `RenderConfig::default()` is enough on a TeX Live host.

use crate::error::RenderError;
use crate::progress::SharedObserver;
use std::fmt;
use std::path::PathBuf;

/// Resolution candidates for PNG output, tried strictly in this order.
pub const DEFAULT_DPI_LADDER: [u32; 7] = [600, 300, 200, 150, 100, 72, 16];

/// Largest PNG width or height accepted before stepping down the ladder.
pub const DEFAULT_MAX_PNG_DIMENSION: u32 = 32768;

/// PDF compatibility level passed to Ghostscript's pdfwrite device.
pub const DEFAULT_PDF_COMPATIBILITY: &str = "1.5";

/// Platform name of the Ghostscript console binary.
pub fn default_ghostscript_bin() -> &'static str {
    if cfg!(windows) {
        "gswin64c"
    } else {
        "gs"
    }
}

/// Configuration for a [`crate::Renderer`].
///
/// # Example
/// ```rust
/// use latex_render::RenderConfig;
///
/// let config = RenderConfig::builder()
///     .dpi_ladder(vec![300, 150, 72])
///     .tool_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi_ladder, vec![300, 150, 72]);
/// ```
#[derive(Clone)]
pub struct RenderConfig {
    /// DVI-producing engine for SVG output. Default: `latex`.
    pub latex_bin: String,

    /// PDF-producing engine for PDF and PNG output. Default: `pdflatex`.
    pub pdflatex_bin: String,

    /// DVI → SVG converter. Default: `dvisvgm`.
    pub dvisvgm_bin: String,

    /// Ghostscript, used for both compression and rasterisation.
    /// Default: `gs` (`gswin64c` on Windows).
    pub ghostscript_bin: String,

    /// Directory under which per-request workspaces are created.
    /// Default: the system temp directory.
    pub workspace_root: PathBuf,

    /// PNG resolution candidates, strictly descending.
    pub dpi_ladder: Vec<u32>,

    /// Maximum PNG width/height in pixels. Default: 32768.
    pub max_png_dimension: u32,

    /// Ghostscript `-dCompatibilityLevel` for PDF output. Default: `1.5`.
    pub pdf_compatibility_level: String,

    /// Per-tool deadline in seconds. Default: none (tools run to completion).
    ///
    /// On expiry the child process is killed and the request ends as an
    /// unexpected failure.
    pub tool_timeout_secs: Option<u64>,

    /// Reject blank sources before allocating a workspace. Default: true.
    pub reject_empty_source: bool,

    /// Optional observer for state transitions and tool timings.
    pub observer: Option<SharedObserver>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            latex_bin: "latex".to_string(),
            pdflatex_bin: "pdflatex".to_string(),
            dvisvgm_bin: "dvisvgm".to_string(),
            ghostscript_bin: default_ghostscript_bin().to_string(),
            workspace_root: std::env::temp_dir(),
            dpi_ladder: DEFAULT_DPI_LADDER.to_vec(),
            max_png_dimension: DEFAULT_MAX_PNG_DIMENSION,
            pdf_compatibility_level: DEFAULT_PDF_COMPATIBILITY.to_string(),
            tool_timeout_secs: None,
            reject_empty_source: true,
            observer: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("latex_bin", &self.latex_bin)
            .field("pdflatex_bin", &self.pdflatex_bin)
            .field("dvisvgm_bin", &self.dvisvgm_bin)
            .field("ghostscript_bin", &self.ghostscript_bin)
            .field("workspace_root", &self.workspace_root)
            .field("dpi_ladder", &self.dpi_ladder)
            .field("max_png_dimension", &self.max_png_dimension)
            .field("pdf_compatibility_level", &self.pdf_compatibility_level)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("reject_empty_source", &self.reject_empty_source)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn RenderObserver>"))
            .finish()
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.dpi_ladder.is_empty() {
            return Err(RenderError::InvalidConfig(
                "DPI ladder must contain at least one resolution".into(),
            ));
        }
        if self.dpi_ladder.contains(&0) {
            return Err(RenderError::InvalidConfig("DPI must be ≥ 1".into()));
        }
        if self.dpi_ladder.windows(2).any(|w| w[0] <= w[1]) {
            return Err(RenderError::InvalidConfig(format!(
                "DPI ladder must be strictly descending, got {:?}",
                self.dpi_ladder
            )));
        }
        if self.max_png_dimension == 0 {
            return Err(RenderError::InvalidConfig(
                "Maximum PNG dimension must be ≥ 1".into(),
            ));
        }
        if self.pdf_compatibility_level.trim().is_empty() {
            return Err(RenderError::InvalidConfig(
                "PDF compatibility level must not be empty".into(),
            ));
        }
        for (name, bin) in [
            ("latex", &self.latex_bin),
            ("pdflatex", &self.pdflatex_bin),
            ("dvisvgm", &self.dvisvgm_bin),
            ("ghostscript", &self.ghostscript_bin),
        ] {
            if bin.trim().is_empty() {
                return Err(RenderError::InvalidConfig(format!(
                    "{name} binary must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn latex_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.latex_bin = bin.into();
        self
    }

    pub fn pdflatex_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.pdflatex_bin = bin.into();
        self
    }

    pub fn dvisvgm_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.dvisvgm_bin = bin.into();
        self
    }

    pub fn ghostscript_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ghostscript_bin = bin.into();
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn dpi_ladder(mut self, ladder: Vec<u32>) -> Self {
        self.config.dpi_ladder = ladder;
        self
    }

    pub fn max_png_dimension(mut self, px: u32) -> Self {
        self.config.max_png_dimension = px;
        self
    }

    pub fn pdf_compatibility_level(mut self, level: impl Into<String>) -> Self {
        self.config.pdf_compatibility_level = level.into();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = Some(secs.max(1));
        self
    }

    pub fn reject_empty_source(mut self, v: bool) -> Self {
        self.config.reject_empty_source = v;
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, RenderError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
