//! Observer trait for render-pipeline events.
//!
//! Inject an [`Arc<dyn RenderObserver>`] via
//! [`crate::config::RenderConfigBuilder::observer`] to receive the state
//! transitions of every request as it moves through the pipeline:
//!
//! ```text
//! WorkspaceReady → SourceWritten → Typeset ─┬─────────────────────→ Converted
//!                                           └─ Rasterizing(dpi)… ─┘
//!            (any state) → ClassifiedFailure | UnexpectedFailure
//! ```
//!
//! Terminal states are reported after the workspace has been torn down.
//!
//! # Example
//!
//! ```rust
//! use latex_render::{RenderConfig, RenderObserver, RenderState, OutputFormat};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RasterCounter {
//!     attempts: AtomicUsize,
//! }
//!
//! impl RenderObserver for RasterCounter {
//!     fn on_transition(&self, _format: OutputFormat, state: RenderState) {
//!         if let RenderState::Rasterizing { .. } = state {
//!             self.attempts.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(RasterCounter { attempts: AtomicUsize::new(0) });
//! let config = RenderConfig::builder()
//!     .observer(counter as Arc<dyn RenderObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ConversionResult, OutputFormat};
use std::fmt;
use std::sync::Arc;

/// Position of a request in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    WorkspaceReady,
    SourceWritten,
    Typeset,
    /// One rung of the PNG DPI ladder.
    Rasterizing { dpi: u32 },
    Converted,
    ClassifiedFailure,
    UnexpectedFailure,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RenderState::Converted | RenderState::ClassifiedFailure | RenderState::UnexpectedFailure
        )
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::WorkspaceReady => f.write_str("workspace ready"),
            RenderState::SourceWritten => f.write_str("source written"),
            RenderState::Typeset => f.write_str("typeset"),
            RenderState::Rasterizing { dpi } => write!(f, "rasterizing @ {dpi} dpi"),
            RenderState::Converted => f.write_str("converted"),
            RenderState::ClassifiedFailure => f.write_str("classified failure"),
            RenderState::UnexpectedFailure => f.write_str("unexpected failure"),
        }
    }
}

/// Called by the render pipeline as each request progresses.
///
/// Implementations must be `Send + Sync`: one renderer serves many
/// concurrent requests. All methods default to no-ops.
pub trait RenderObserver: Send + Sync {
    /// A request was accepted; nothing has touched the filesystem yet.
    fn on_render_start(&self, format: OutputFormat, source_len: usize) {
        let _ = (format, source_len);
    }

    /// The request entered `state`.
    fn on_transition(&self, format: OutputFormat, state: RenderState) {
        let _ = (format, state);
    }

    /// An external tool exited (successfully or not).
    fn on_tool_complete(&self, tool: &str, success: bool, elapsed_ms: u64) {
        let _ = (tool, success, elapsed_ms);
    }

    /// A raster came back larger than the configured maximum dimension.
    fn on_raster_oversized(&self, dpi: u32, width: u32, height: u32) {
        let _ = (dpi, width, height);
    }

    /// The request finished; the workspace is already gone.
    fn on_render_complete(&self, format: OutputFormat, result: &ConversionResult, elapsed_ms: u64) {
        let _ = (format, result, elapsed_ms);
    }
}

/// Default observer when none is configured.
pub struct NoopObserver;

impl RenderObserver for NoopObserver {}

/// Type stored in [`crate::config::RenderConfig`].
pub type SharedObserver = Arc<dyn RenderObserver>;
