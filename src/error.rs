//! Error types for the latex-render library.
//!
//! Two distinct families reflect two distinct audiences:
//!
//! * [`ErrorCode`] (external) is the stable, machine-readable token a
//!   serving layer puts in front of a client (`DIM_TOO_LARGE`, `LATEX_ERROR`,
//!   …). Tokens never carry paths, tool output, or host details.
//!
//! * [`RenderError`] (internal) is a workspace, filesystem, or process
//!   failure that has nothing to do with the submitted source. These are
//!   logged in full and surface to the client only as
//!   [`ErrorCode::UnexpectedLatexError`].
//!
//! Per-request outcomes are not errors at the API boundary: the `render_*`
//! entry points return a [`crate::output::ConversionResult`] whose variant
//! tells the caller which of the two applies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Name of the response header a serving layer uses to carry the token.
pub const ERROR_CODE_HEADER: &str = "App-Error-Code";

/// Stable error token exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A box or graphic exceeded TeX's maximum dimension.
    #[serde(rename = "DIM_TOO_LARGE")]
    DimensionTooLarge,
    /// Numeric overflow during layout computation.
    ArithmeticOverflow,
    /// An internal TeX memory or nesting limit was reached.
    TexCapacityExceeded,
    /// Any other fatal TeX error carrying a `! ` marker line.
    LatexError,
    /// Tool failed without a recognised signature, or an internal error.
    UnexpectedLatexError,
}

impl ErrorCode {
    /// The token as sent over the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DimensionTooLarge => "DIM_TOO_LARGE",
            ErrorCode::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
            ErrorCode::TexCapacityExceeded => "TEX_CAPACITY_EXCEEDED",
            ErrorCode::LatexError => "LATEX_ERROR",
            ErrorCode::UnexpectedLatexError => "UNEXPECTED_LATEX_ERROR",
        }
    }

    /// `true` for codes that are deterministic and safe to blame on the source.
    pub fn is_client_error(self) -> bool {
        !matches!(self, ErrorCode::UnexpectedLatexError)
    }

    /// HTTP status a serving layer should pair with this code.
    pub fn http_status(self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal failures of the render pipeline.
///
/// None of these are caused by the content of the LaTeX source; they are
/// reported to clients only as an opaque unexpected failure.
#[derive(Debug, Error)]
pub enum RenderError {
    // ── Workspace errors ──────────────────────────────────────────────────
    /// The scratch directory could not be allocated.
    #[error("Failed to create workspace under '{root}': {source}")]
    WorkspaceCreate {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scratch directory could not be removed.
    #[error("Failed to remove workspace '{path}': {source}")]
    WorkspaceRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisting the LaTeX source into the workspace failed.
    #[error("Failed to write source file '{path}': {source}")]
    SourceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Process errors ────────────────────────────────────────────────────
    /// The tool binary is not on `PATH`.
    #[error("Tool '{tool}' not found\nInstall it or point the configuration at the right binary.")]
    ToolNotFound { tool: String },

    /// The tool exists but could not be started.
    #[error("Failed to spawn '{tool}': {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool did not exit within the configured deadline and was killed.
    #[error("Tool '{tool}' timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// A tool reported success but its output file is absent.
    #[error("Expected output '{path}' was not produced")]
    MissingOutput { path: PathBuf },

    /// The produced artifact could not be read back.
    #[error("Failed to read artifact '{path}': {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The raster header could not be decoded.
    #[error("Failed to read image header of '{path}': {detail}")]
    ImageHeader { path: PathBuf, detail: String },

    /// Could not write the artifact to its final destination.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (join failure, runtime creation, …).
    #[error("Internal error: {0}")]
    Internal(String),
}
