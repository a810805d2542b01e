//! Three-phase inline-markdown transform shared by the ANSI and HTML
//! renderers (§4.D.3/§4.D.4 specify identical passes; the teacher's
//! `events.rs` duplicated tool-lifecycle tracking across handlers, and the
//! design note calls for factoring this kind of thing out instead).
//!
//! Phases: (1) lift fenced and inline code spans out to placeholders so
//! later passes never reach into code, (2) bold (`**text**`), scanning its
//! own captured content for nested italic, (3) standalone italic
//! (`*text*`) outside any bold span, (4) restore the code spans, wrapped
//! by the caller's `code` formatter.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").unwrap());
static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*").unwrap());
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new("\u{0}(\\d+)\u{0}").unwrap());

/// The three formatting primitives a concrete renderer supplies.
pub struct MarkdownStyle<'a> {
    pub code: &'a dyn Fn(&str) -> String,
    pub bold: &'a dyn Fn(&str) -> String,
    pub italic: &'a dyn Fn(&str) -> String,
}

pub fn render_inline(text: &str, style: &MarkdownStyle<'_>) -> String {
    let mut extracted: Vec<String> = Vec::new();
    let mut lift = |caps: &Captures| -> String {
        extracted.push(caps[1].to_string());
        format!("\u{0}{}\u{0}", extracted.len() - 1)
    };

    let after_blocks = CODE_BLOCK.replace_all(text, |c: &Captures| lift(c));
    let after_spans = CODE_SPAN.replace_all(&after_blocks, |c: &Captures| lift(c));

    let bolded = BOLD.replace_all(&after_spans, |caps: &Captures| {
        let inner = ITALIC.replace_all(&caps[1], |ic: &Captures| (style.italic)(&ic[1]));
        (style.bold)(&inner)
    });

    let italicized = ITALIC.replace_all(&bolded, |caps: &Captures| (style.italic)(&caps[1]));

    PLACEHOLDER
        .replace_all(&italicized, |caps: &Captures| {
            let idx: usize = caps[1].parse().expect("placeholder index is always numeric");
            (style.code)(&extracted[idx])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_style() -> MarkdownStyle<'static> {
        MarkdownStyle {
            code: &|s| format!("[code:{s}]"),
            bold: &|s| format!("[bold:{s}]"),
            italic: &|s| format!("[italic:{s}]"),
        }
    }

    #[test]
    fn renders_code_span() {
        let out = render_inline("run `ls -la` now", &plain_style());
        assert_eq!(out, "run [code:ls -la] now");
    }

    #[test]
    fn renders_fenced_code_block() {
        let out = render_inline("```\nlet x = 1;\n```", &plain_style());
        assert_eq!(out, "[code:\nlet x = 1;\n]");
    }

    #[test]
    fn renders_bold_and_italic() {
        assert_eq!(render_inline("**strong**", &plain_style()), "[bold:strong]");
        assert_eq!(render_inline("*emph*", &plain_style()), "[italic:emph]");
    }

    #[test]
    fn bold_handles_nested_italic() {
        let out = render_inline("**bold *and italic* text**", &plain_style());
        assert_eq!(out, "[bold:bold [italic:and italic] text]");
    }

    #[test]
    fn code_spans_are_immune_to_bold_and_italic_markers_inside() {
        let out = render_inline("`**not bold**`", &plain_style());
        assert_eq!(out, "[code:**not bold**]");
    }

    #[test]
    fn plain_text_without_markers_passes_through() {
        let out = render_inline("nothing special here", &plain_style());
        assert_eq!(out, "nothing special here");
    }
}
