//! Result types returned by the render entry points.
//!
//! A request always produces exactly one [`ConversionResult`] variant. The
//! public accessors (`status_code`, `error_code`, `public_message`) are what
//! a serving layer should put on the wire; `detail` of an unexpected failure
//! is for server-side logs only and is deliberately absent from
//! [`RenderReport`].

use crate::error::ErrorCode;
use crate::pipeline::classify::UNEXPECTED_MESSAGE;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three request-scoped flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// latex → DVI → dvisvgm
    Svg,
    /// pdflatex → Ghostscript pdfwrite
    Pdf,
    /// pdflatex → Ghostscript pngmono, DPI ladder
    Png,
}

impl OutputFormat {
    /// Content type of a successful artifact.
    pub fn content_type(self) -> ContentType {
        match self {
            OutputFormat::Svg => ContentType::Svg,
            OutputFormat::Pdf => ContentType::Pdf,
            OutputFormat::Png => ContentType::Png,
        }
    }

    /// Prefix of the per-request workspace directory name.
    pub fn workspace_prefix(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg-",
            OutputFormat::Pdf => "pdf-",
            OutputFormat::Png => "png-",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
        })
    }
}

/// MIME type of a rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "image/svg+xml")]
    Svg,
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/png")]
    Png,
}

impl ContentType {
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Svg => "image/svg+xml",
            ContentType::Pdf => "application/pdf",
            ContentType::Png => "image/png",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ContentType::Svg => "svg",
            ContentType::Pdf => "pdf",
            ContentType::Png => "png",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Which rung of the DPI ladder produced a raster, and its real size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub dpi: u32,
    pub width: u32,
    pub height: u32,
    /// `false` only for the best-effort result after the ladder is exhausted.
    pub within_bounds: bool,
}

/// A successfully rendered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: ContentType,
    /// Present for PNG output only.
    pub raster: Option<RasterInfo>,
}

/// Outcome of one render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    /// Artifact produced.
    Success(Artifact),
    /// The source failed in a recognised, deterministic way.
    ClassifiedFailure { code: ErrorCode, message: String },
    /// Anything else. `detail` is for logs, never for clients.
    UnexpectedFailure { detail: String },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success(_))
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            ConversionResult::Success(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_artifact(self) -> Option<Artifact> {
        match self {
            ConversionResult::Success(a) => Some(a),
            _ => None,
        }
    }

    /// Declared type of the artifact; `None` for failures.
    pub fn content_type(&self) -> Option<ContentType> {
        self.artifact().map(|a| a.content_type)
    }

    /// Token for the error header; `None` on success.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ConversionResult::Success(_) => None,
            ConversionResult::ClassifiedFailure { code, .. } => Some(*code),
            ConversionResult::UnexpectedFailure { .. } => Some(ErrorCode::UnexpectedLatexError),
        }
    }

    /// 200 on success, 400 for classified, 500 for unexpected.
    pub fn status_code(&self) -> u16 {
        self.error_code().map(ErrorCode::http_status).unwrap_or(200)
    }

    /// Short human-readable message safe to return to a client.
    pub fn public_message(&self) -> Option<&str> {
        match self {
            ConversionResult::Success(_) => None,
            ConversionResult::ClassifiedFailure { message, .. } => Some(message),
            ConversionResult::UnexpectedFailure { .. } => Some(UNEXPECTED_MESSAGE),
        }
    }

    /// Short label for logs and progress output.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionResult::Success(_) => "converted",
            ConversionResult::ClassifiedFailure { .. } => "classified failure",
            ConversionResult::UnexpectedFailure { .. } => "unexpected failure",
        }
    }

    /// Client-safe, serialisable view of this result.
    pub fn to_report(&self) -> RenderReport {
        match self {
            ConversionResult::Success(a) => RenderReport {
                ok: true,
                status: 200,
                content_type: Some(a.content_type),
                data: Some(STANDARD.encode(&a.bytes)),
                raster: a.raster,
                error_code: None,
                message: None,
            },
            other => RenderReport {
                ok: false,
                status: other.status_code(),
                content_type: None,
                data: None,
                raster: None,
                error_code: other.error_code(),
                message: other.public_message().map(str::to_string),
            },
        }
    }
}

/// JSON-friendly view of a [`ConversionResult`].
///
/// Artifact bytes are base64 encoded. Raw tool output never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    pub ok: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster: Option<RasterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
