//! Classification of TeX failures from unstructured tool output.
//!
//! TeX reports errors as free text, one `! <message>` line per fatal error,
//! mixed into pages of transcript. This module turns that text into a stable
//! [`ErrorCode`] in two passes:
//!
//! 1. **Signature table**: [`SIGNATURE_RULES`] is scanned top to bottom and
//!    the first literal substring found wins. These checks run even when
//!    the tool exited successfully, because TeX can report a size error and
//!    still produce (broken) output.
//! 2. **Fatal-marker fallback**: if the tool failed and no signature
//!    matched, the remainder of the first line beginning with `! ` becomes a
//!    [`ErrorCode::LatexError`] message. With no such line the failure is
//!    [`Verdict::Unexpected`].
//!
//! Everything here is a pure function of the output text, so the table can
//! be tested against captured logs without spawning a tool.

use crate::error::ErrorCode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix TeX puts in front of every fatal error line.
pub const FATAL_MARKER: &str = "! ";

/// Message used when a failure cannot be attributed to the source.
pub const UNEXPECTED_MESSAGE: &str = "Unexpected LaTeX Error";

/// One entry in the ordered signature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRule {
    /// Literal substring searched for in the combined output.
    pub pattern: &'static str,
    pub code: ErrorCode,
    /// Client-facing message for this code.
    pub message: &'static str,
}

/// Known failure signatures in priority order.
pub const SIGNATURE_RULES: &[SignatureRule] = &[
    SignatureRule {
        pattern: "! Dimension too large",
        code: ErrorCode::DimensionTooLarge,
        message: "Dimension too large",
    },
    SignatureRule {
        pattern: "! Arithmetic overflow",
        code: ErrorCode::ArithmeticOverflow,
        message: "Arithmetic overflow",
    },
    SignatureRule {
        pattern: "! TeX capacity exceeded",
        code: ErrorCode::TexCapacityExceeded,
        message: "TeX capacity exceeded",
    },
];

// Lines are split on \n; a trailing \r from CRLF logs is trimmed afterwards.
static FATAL_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^! (.*)$").unwrap());

/// A classified, client-safe failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub code: ErrorCode,
    pub message: String,
}

/// Result of inspecting one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No failure detected.
    Passed,
    /// Recognised failure with a stable code.
    Classified(Classification),
    /// Tool failed and nothing in its output explains why.
    Unexpected,
}

/// Classify the combined output of a tool run.
///
/// `succeeded` is the tool's exit status. A successful run is still
/// checked against the signature table; the fatal-marker fallback applies
/// only to failed runs.
pub fn classify(output: &str, succeeded: bool) -> Verdict {
    if let Some(rule) = match_signature(output) {
        return Verdict::Classified(Classification {
            code: rule.code,
            message: rule.message.to_string(),
        });
    }

    if succeeded {
        return Verdict::Passed;
    }

    match first_fatal_message(output) {
        Some(message) => Verdict::Classified(Classification {
            code: ErrorCode::LatexError,
            message,
        }),
        None => Verdict::Unexpected,
    }
}

/// First rule of [`SIGNATURE_RULES`] whose pattern occurs in `output`.
pub fn match_signature(output: &str) -> Option<&'static SignatureRule> {
    SIGNATURE_RULES
        .iter()
        .find(|rule| output.contains(rule.pattern))
}

/// Trimmed remainder of the first `! ` line.
///
/// Only the first marker line counts. If its remainder is blank the result
/// is `None`, even when a later `! ` line carries text.
pub fn first_fatal_message(output: &str) -> Option<String> {
    FATAL_LINE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}
