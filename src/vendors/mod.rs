//! Concrete vendor parsers shipped with the core: Claude, Amp, Gemini.
//!
//! See each submodule for the vendor's classification rules. Priorities
//! (Claude 100, Amp 80, Gemini 10) are applied by
//! [`crate::registry::ParserRegistry::with_defaults`].

pub mod amp;
pub mod claude;
pub mod gemini;

/// Truncate a string at a char boundary, appending `...` if truncated.
/// Shared by the vendor parsers for error-message and detail construction.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
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
