//! Error types shared across the reader, registry, coordinator, and renderers.
//!
//! Internal errors are concrete `thiserror` enums; `anyhow` is reserved for
//! the CLI binary at the very edge (see `src/bin/clemini-fmt.rs`).

use serde::Serialize;
use std::fmt;

/// Context attached to a [`ParseError`], per the wire contract in the spec's
/// `ParseError` JSON form.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_format: Option<String>,
}

impl ErrorContext {
    pub fn with_line_number(line_number: u64) -> Self {
        Self {
            line_number: Some(line_number),
            ..Default::default()
        }
    }
}

/// A parse failure raised by a vendor parser, enriched with context as it
/// propagates through the coordinator.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub vendor: String,
    /// The offending line, truncated for display.
    pub line: String,
    pub cause: Option<String>,
    pub context: ErrorContext,
}

/// Lines longer than this in a `ParseError`'s stored `line` are truncated.
const MAX_ERROR_LINE_LEN: usize = 200;

impl ParseError {
    pub fn new(vendor: impl Into<String>, message: impl Into<String>, line: &str) -> Self {
        Self {
            message: message.into(),
            vendor: vendor.into(),
            line: truncate_for_display(line, MAX_ERROR_LINE_LEN),
            cause: None,
            context: ErrorContext::default(),
        }
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    /// Attach a line number if one isn't already present in the context.
    pub fn ensure_line_number(mut self, line_number: u64) -> Self {
        if self.context.line_number.is_none() {
            self.context.line_number = Some(line_number);
        }
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// JSON serialization matching the spec's `ParseError` wire contract:
/// `{ "name":"ParseError", "message":"...", "vendor":"...", "context": {...} }`.
impl Serialize for ParseError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ParseError", 4)?;
        state.serialize_field("name", "ParseError")?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("vendor", &self.vendor)?;
        state.serialize_field("context", &self.context)?;
        state.end()
    }
}

fn truncate_for_display(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let boundary = s
        .char_indices()
        .take_while(|(i, _)| *i < max_len)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!("{}...", &s[..boundary])
}

/// Errors raised by the [`crate::reader::LineReader`].
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by [`crate::registry::ParserRegistry`].
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("vendor identifier must be a non-empty, trimmed string")]
    EmptyVendor,
    #[error("'auto' is a reserved vendor identifier and cannot be registered")]
    ReservedVendor,
    #[error("priority must be finite")]
    NonFinitePriority,
    #[error("unknown vendor: {0}")]
    UnknownVendor(String),
    #[error("could not detect vendor for line: {0}")]
    DetectionFailed(String),
    #[error("auto-detection requires a sample line")]
    NoSampleLine,
}

/// Errors raised by [`crate::coordinator::StreamingCoordinator`].
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("vendor detection failed: {0}")]
    Detection(#[from] RegistryError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("Stopped after {count} consecutive errors ({successful}/{total} lines succeeded)")]
    TooManyConsecutiveErrors {
        count: u32,
        successful: u64,
        total: u64,
    },
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),
}
