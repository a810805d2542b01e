//! Rendering Pipeline — turns normalized events into displayable text.
//!
//! Three concrete renderers ([`ansi`], [`html`], [`json`]) share one
//! [`RenderOptions`] shape and one [`ToolTracker`] for tool-lifecycle
//! bookkeeping (the teacher's `events.rs` duplicated this tracking across
//! its terminal/TUI handlers; factored here into one place per the design
//! note on renderer statefulness).

mod ansi;
mod html;
mod json;
mod markdown;

pub use ansi::AnsiRenderer;
pub use html::HtmlRenderer;
pub use json::JsonRenderer;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::coordinator::StreamingCoordinator;
use crate::errors::CoordinatorError;
use crate::events::Event;

/// Which concrete renderer [`RenderOptions`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ansi,
    Html,
    Json,
}

/// Shared render options (§4.D.1). `format` has no sensible default, so
/// construction goes through [`RenderOptions::new`] rather than `Default`.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub format: Format,
    pub collapse_tools: bool,
    pub hide_tools: bool,
    pub hide_cost: bool,
    pub hide_debug: bool,
    pub show_timestamps: bool,
    pub compact_mode: bool,
    pub color_disabled: bool,
}

impl RenderOptions {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            collapse_tools: false,
            hide_tools: false,
            hide_cost: false,
            hide_debug: false,
            show_timestamps: false,
            compact_mode: false,
            color_disabled: false,
        }
    }

    fn is_hidden(&self, event: &Event) -> bool {
        matches!(
            (event, self.hide_tools, self.hide_cost, self.hide_debug),
            (Event::Tool { .. }, true, _, _)
                | (Event::Cost { .. }, _, true, _)
                | (Event::Debug { .. }, _, _, true)
        )
    }

    /// Current time as ISO-8601, for `showTimestamps`.
    fn timestamp(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

/// Truncation length for a collapsed tool's combined-output summary
/// (SPEC_FULL OQ-5: a presentation choice, not part of the data contract).
pub const COLLAPSED_SUMMARY_LEN: usize = 100;

/// One tool's in-flight lifecycle state.
struct ToolState {
    start: Instant,
    collapsed: bool,
    buffer: String,
    line_count: usize,
}

/// What [`ToolTracker::end`] hands back to a renderer to describe a
/// completed tool.
pub struct ToolSummary {
    pub duration: Duration,
    pub collapsed_output: Option<String>,
    pub line_count: usize,
}

/// Shared tool-lifecycle bookkeeping used by both the ANSI and HTML
/// renderers (§4.D.2). The JSON renderer also drives one, purely so its
/// `flush` behavior stays consistent with the others (it never narrates).
#[derive(Default)]
pub struct ToolTracker {
    active: HashMap<String, ToolState>,
}

impl ToolTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, name: &str, collapsed: bool) {
        self.active.insert(
            name.to_string(),
            ToolState {
                start: Instant::now(),
                collapsed,
                buffer: String::new(),
                line_count: 0,
            },
        );
    }

    /// Record output for `name`. Returns `true` if the tool is tracked and
    /// collapsed (so the caller should suppress inline emission and rely on
    /// the buffered summary at `end` instead). A tool with no matching
    /// `start` is reported as not-collapsed, so callers fall back to their
    /// inline-emission default per §4.D.2's "MUST NOT crash" rule.
    pub fn record_output(&mut self, name: &str, text: &str) -> bool {
        let Some(state) = self.active.get_mut(name) else {
            return false;
        };
        state.line_count += 1;
        if state.collapsed {
            if !state.buffer.is_empty() {
                state.buffer.push('\n');
            }
            state.buffer.push_str(text);
            true
        } else {
            false
        }
    }

    /// Finalize `name`, returning its summary and dropping its state.
    /// `None` if there was no matching `start`.
    pub fn end(&mut self, name: &str) -> Option<ToolSummary> {
        let state = self.active.remove(name)?;
        let collapsed_output = state
            .collapsed
            .then(|| truncate(&state.buffer, COLLAPSED_SUMMARY_LEN));
        Some(ToolSummary {
            duration: state.start.elapsed(),
            collapsed_output,
            line_count: state.line_count,
        })
    }

    /// Drain any tools still open, in insertion-unordered but stable-enough
    /// order for a warning pass; used by `flush`.
    pub fn drain_interrupted(&mut self) -> Vec<String> {
        let mut names: Vec<String> = self.active.keys().cloned().collect();
        names.sort();
        self.active.clear();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
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

/// Formats `duration` the way the ANSI/HTML tool-end lines present it:
/// millisecond precision under a second, otherwise seconds with two
/// decimal places.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{secs:.2}s")
    }
}

/// A value implementing the three rendering operations (§4.D).
pub trait Renderer {
    /// Render one event, possibly producing no output (filtered).
    fn render(&mut self, event: &Event) -> String;

    /// Concatenation of per-event renders.
    fn render_batch(&mut self, events: &[Event]) -> String {
        events.iter().map(|e| self.render(e)).collect()
    }

    /// Emit any pending closures (e.g. warnings for tools that never ended).
    fn flush(&mut self) -> String;
}

/// Combines a [`StreamingCoordinator`] with a [`Renderer`] (§4.D.6):
/// yields rendered output chunks in order, applies an optional tag filter
/// before rendering, flushes at end-of-source, and flushes before
/// propagating a fatal error.
pub struct RenderCoordinator<R, V> {
    coordinator: StreamingCoordinator<R>,
    renderer: V,
    event_filter: Option<Vec<&'static str>>,
    flushed: bool,
    pending_error: Option<CoordinatorError>,
}

impl<R, V> RenderCoordinator<R, V>
where
    R: std::io::Read,
    V: Renderer,
{
    pub fn new(coordinator: StreamingCoordinator<R>, renderer: V) -> Self {
        Self {
            coordinator,
            renderer,
            event_filter: None,
            flushed: false,
            pending_error: None,
        }
    }

    /// Restrict output to events whose tag is in `tags`.
    pub fn with_event_filter(mut self, tags: Vec<&'static str>) -> Self {
        self.event_filter = Some(tags);
        self
    }

    fn passes_filter(&self, event: &Event) -> bool {
        match &self.event_filter {
            None => true,
            Some(tags) => tags.contains(&event.tag()),
        }
    }

    fn do_flush(&mut self) -> Option<String> {
        if self.flushed {
            return None;
        }
        self.flushed = true;
        let out = self.renderer.flush();
        if out.is_empty() { None } else { Some(out) }
    }
}

impl<R, V> Iterator for RenderCoordinator<R, V>
where
    R: std::io::Read,
    V: Renderer,
{
    type Item = Result<String, CoordinatorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            return Some(Err(e));
        }
        loop {
            match self.coordinator.next() {
                Some(Ok(event)) => {
                    if !self.passes_filter(&event) {
                        continue;
                    }
                    let chunk = self.renderer.render(&event);
                    if chunk.is_empty() {
                        continue;
                    }
                    return Some(Ok(chunk));
                }
                Some(Err(e)) => {
                    if let Some(flush_out) = self.do_flush() {
                        // Surface the flush first; the error follows on the
                        // next pull so callers see well-formed trailing output.
                        self.pending_error = Some(e);
                        return Some(Ok(flush_out));
                    }
                    return Some(Err(e));
                }
                None => return self.do_flush().map(Ok),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_tracker_collapses_output_until_end() {
        let mut tracker = ToolTracker::new();
        tracker.start("build", true);
        assert!(tracker.record_output("build", "line one"));
        assert!(tracker.record_output("build", "line two"));
        let summary = tracker.end("build").unwrap();
        assert_eq!(summary.line_count, 2);
        assert_eq!(summary.collapsed_output.unwrap(), "line one\nline two");
    }

    #[test]
    fn tool_tracker_streams_output_when_not_collapsed() {
        let mut tracker = ToolTracker::new();
        tracker.start("build", false);
        assert!(!tracker.record_output("build", "hello"));
        let summary = tracker.end("build").unwrap();
        assert!(summary.collapsed_output.is_none());
        assert_eq!(summary.line_count, 1);
    }

    #[test]
    fn output_without_start_is_not_collapsed() {
        let mut tracker = ToolTracker::new();
        assert!(!tracker.record_output("ghost", "hi"));
        assert!(tracker.end("ghost").is_none());
    }

    #[test]
    fn flush_drains_interrupted_tools() {
        let mut tracker = ToolTracker::new();
        tracker.start("a", false);
        tracker.start("b", true);
        let interrupted = tracker.drain_interrupted();
        assert_eq!(interrupted, vec!["a".to_string(), "b".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn collapsed_summary_is_truncated() {
        let mut tracker = ToolTracker::new();
        tracker.start("t", true);
        tracker.record_output("t", &"x".repeat(200));
        let summary = tracker.end("t").unwrap();
        let out = summary.collapsed_output.unwrap();
        assert!(out.len() <= COLLAPSED_SUMMARY_LEN + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn format_duration_switches_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    mod render_coordinator {
        use super::super::*;
        use crate::coordinator::StreamOptions;
        use crate::registry::ParserRegistry;
        use std::io::Cursor;
        use std::sync::Arc;

        fn coordinator(input: &str, vendor: &str) -> StreamingCoordinator<Cursor<Vec<u8>>> {
            StreamingCoordinator::new(
                Cursor::new(input.as_bytes().to_vec()),
                Arc::new(ParserRegistry::with_defaults()),
                StreamOptions {
                    vendor: Some(vendor.to_string()),
                    ..Default::default()
                },
            )
        }

        #[test]
        fn yields_rendered_chunks_then_flush_at_end_of_source() {
            let coord = coordinator(r#"{"type":"message","role":"user","content":"hi"}"#, "claude");
            let mut opts = RenderOptions::new(Format::Ansi);
            opts.color_disabled = true;
            let renderer = AnsiRenderer::new(opts);
            let chunks: Vec<String> = RenderCoordinator::new(coord, renderer)
                .map(|r| r.unwrap())
                .collect();
            assert_eq!(chunks.len(), 1);
            assert!(chunks[0].contains("hi"));
        }

        #[test]
        fn event_filter_drops_non_matching_tags() {
            let input = [
                r#"{"type":"message","role":"user","content":"hi"}"#,
                r#"{"type":"usage","delta_usd":0.01}"#,
            ]
            .join("\n");
            let coord = coordinator(&input, "claude");
            let mut opts = RenderOptions::new(Format::Json);
            opts.compact_mode = true;
            let renderer = JsonRenderer::new(opts);
            let chunks: Vec<String> = RenderCoordinator::new(coord, renderer)
                .with_event_filter(vec!["cost"])
                .map(|r| r.unwrap())
                .collect();
            assert_eq!(chunks.len(), 1);
            assert!(chunks[0].contains("\"t\":\"cost\""));
        }

        #[test]
        fn fatal_error_flushes_pending_tool_before_propagating() {
            let input = "{\"type\":\"tool_use\",\"id\":\"t1\",\"name\":\"Bash\"}\nnot json\n";
            let coord = StreamingCoordinator::new(
                Cursor::new(input.as_bytes().to_vec()),
                Arc::new(ParserRegistry::with_defaults()),
                StreamOptions {
                    vendor: Some("claude".to_string()),
                    continue_on_error: false,
                    ..Default::default()
                },
            );
            let mut opts = RenderOptions::new(Format::Ansi);
            opts.color_disabled = true;
            let renderer = AnsiRenderer::new(opts);
            let mut rc = RenderCoordinator::new(coord, renderer);
            let first = rc.next().unwrap().unwrap();
            assert!(first.contains("🔧 Bash"));
            // The malformed second line surfaces as a recoverable `error`
            // event before the stream goes fatal (continueOnError=false
            // still yields any already-queued recoverable output first).
            let second = rc.next().unwrap().unwrap();
            assert!(second.contains("error:"));
            let third = rc.next().unwrap();
            match third {
                Ok(flush_out) => assert!(flush_out.contains("interrupted")),
                Err(_) => panic!("expected flush output before the fatal error"),
            }
            assert!(rc.next().unwrap().is_err());
        }
    }
}
