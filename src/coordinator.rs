//! Streaming Coordinator — drives the Line Reader through the Parser
//! Registry, manages sticky vendor selection, recovers from errors, and
//! enforces a consecutive-failure budget.
//!
//! Single-threaded, pull-based: [`StreamingCoordinator`] implements
//! [`Iterator`], suspending wherever the underlying reader suspends and
//! again after each yielded event, matching the suspension points in
//! SPEC_FULL.md §5. Cancellation is just "the consumer stops pulling" —
//! dropping the iterator releases the reader (and, through it, the source)
//! within one step.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;

use crate::errors::CoordinatorError;
use crate::events::Event;
use crate::reader::{LineReader, LineReaderOptions};
use crate::registry::{ParserRegistry, AUTO_VENDOR};
use crate::vendors::truncate;

/// Configuration for a [`StreamingCoordinator`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// `None`/`Some("auto")` both mean auto-detect on the first line.
    pub vendor: Option<String>,
    pub continue_on_error: bool,
    pub emit_debug_events: bool,
    pub max_consecutive_errors: u32,
    pub line_reader_options: LineReaderOptions,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            vendor: None,
            continue_on_error: true,
            emit_debug_events: false,
            max_consecutive_errors: 100,
            line_reader_options: LineReaderOptions::default(),
        }
    }
}

/// A fixed-size truncation applied to the line embedded in a debug-event
/// diagnostic trace (§4.C step 2e).
const DEBUG_EVENT_LINE_TRUNCATION: usize = 200;

/// Produces a lazy sequence of normalized events from a raw byte source.
///
/// Recoverable failures are yielded as `Ok(Event::Error{..})` (and,
/// optionally, a companion `Ok(Event::Debug{..})`); only fatal conditions —
/// detection failure, an unknown explicit vendor, or consecutive-failure
/// overflow — surface as `Err(..)`, and any already-queued recoverable
/// events are drained first.
pub struct StreamingCoordinator<R> {
    reader: LineReader<R>,
    registry: Arc<ParserRegistry>,
    options: StreamOptions,
    bound_vendor: Option<String>,
    consecutive_errors: u32,
    total_lines: u64,
    successful_lines: u64,
    error_lines: u64,
    any_line_read: bool,
    emitted_vendor_debug: bool,
    pending: VecDeque<Event>,
    finished: bool,
    terminal_error: Option<CoordinatorError>,
}

impl<R: Read> StreamingCoordinator<R> {
    pub fn new(source: R, registry: Arc<ParserRegistry>, options: StreamOptions) -> Self {
        let reader = LineReader::new(source, options.line_reader_options.clone());
        Self {
            reader,
            registry,
            options,
            bound_vendor: None,
            consecutive_errors: 0,
            total_lines: 0,
            successful_lines: 0,
            error_lines: 0,
            any_line_read: false,
            emitted_vendor_debug: false,
            pending: VecDeque::new(),
            finished: false,
            terminal_error: None,
        }
    }

    fn bind_vendor(&mut self, sample_line: &str) -> Result<String, CoordinatorError> {
        let requested = self.options.vendor.as_deref();
        let explicit = requested.filter(|v| *v != AUTO_VENDOR);
        let vendor = self.registry.select(explicit, Some(sample_line))?;
        Ok(vendor)
    }

    fn summary_event(&self) -> Event {
        let success_rate = if self.total_lines == 0 {
            0.0
        } else {
            self.successful_lines as f64 / self.total_lines as f64
        };
        Event::debug(serde_json::json!({
            "summary": {
                "totalLines": self.total_lines,
                "successfulLines": self.successful_lines,
                "errorLines": self.error_lines,
                "successRate": success_rate,
            }
        }))
    }

    fn fail(&mut self, err: CoordinatorError) {
        self.finished = true;
        self.terminal_error = Some(err);
    }

    fn process_line(&mut self, line: crate::reader::Line) {
        self.total_lines += 1;

        let vendor = if let Some(v) = self.bound_vendor.clone() {
            v
        } else {
            match self.bind_vendor(&line.text) {
                Ok(v) => {
                    self.bound_vendor = Some(v.clone());
                    v
                }
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }
        };

        let parsed = self
            .registry
            .get(&vendor, |parser| parser.parse(&line.text));

        let Some(parsed) = parsed else {
            self.fail(CoordinatorError::Detection(
                crate::errors::RegistryError::UnknownVendor(vendor),
            ));
            return;
        };

        match parsed {
            Ok(events) => {
                self.successful_lines += 1;
                self.consecutive_errors = 0;
                if self.options.emit_debug_events && !self.emitted_vendor_debug {
                    self.emitted_vendor_debug = true;
                    self.pending
                        .push_back(Event::debug(serde_json::json!({"vendorDetected": vendor})));
                }
                self.pending.extend(events);
            }
            Err(parse_error) => {
                self.error_lines += 1;
                let enriched = parse_error.ensure_line_number(line.number);
                tracing::debug!(
                    line = line.number,
                    vendor = %enriched.vendor,
                    "recoverable parse failure: {}",
                    enriched.message
                );
                self.pending
                    .push_back(Event::error(format!("Line {}: {}", line.number, enriched.message)));
                if self.options.emit_debug_events {
                    self.pending.push_back(Event::debug(serde_json::json!({
                        "lineNumber": line.number,
                        "vendor": enriched.vendor,
                        "line": truncate(&enriched.line, DEBUG_EVENT_LINE_TRUNCATION),
                        "cause": enriched.cause,
                    })));
                }

                if !self.options.continue_on_error {
                    self.finished = true;
                    self.terminal_error = Some(CoordinatorError::Parse(enriched));
                    return;
                }

                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.options.max_consecutive_errors {
                    self.finished = true;
                    self.terminal_error = Some(CoordinatorError::TooManyConsecutiveErrors {
                        count: self.consecutive_errors,
                        successful: self.successful_lines,
                        total: self.total_lines,
                    });
                }
            }
        }
    }

    fn advance(&mut self) {
        match self.reader.next_line() {
            Ok(Some(line)) => {
                self.any_line_read = true;
                self.process_line(line);
            }
            Ok(None) => {
                self.finished = true;
                if self.options.emit_debug_events && self.any_line_read {
                    self.pending.push_back(self.summary_event());
                }
            }
            Err(e) => {
                self.fail(CoordinatorError::Reader(e));
            }
        }
    }
}

impl<R: Read> Iterator for StreamingCoordinator<R> {
    type Item = Result<Event, CoordinatorError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return self.terminal_error.take().map(Err);
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Role;
    use std::io::Cursor;

    fn coordinator(input: &str, options: StreamOptions) -> StreamingCoordinator<Cursor<Vec<u8>>> {
        StreamingCoordinator::new(
            Cursor::new(input.as_bytes().to_vec()),
            Arc::new(ParserRegistry::with_defaults()),
            options,
        )
    }

    #[test]
    fn s1_claude_basic_message() {
        let options = StreamOptions {
            vendor: Some("claude".to_string()),
            ..Default::default()
        };
        let mut coord = coordinator(r#"{"type":"message","role":"user","content":"Hello"}"#, options);
        let event = coord.next().unwrap().unwrap();
        assert_eq!(event, Event::msg(Role::User, "Hello"));
        assert!(coord.next().is_none());
    }

    #[test]
    fn s2_malformed_json_under_auto_is_adopted_by_gemini() {
        let mut coord = coordinator("not json at all", StreamOptions::default());
        let event = coord.next().unwrap().unwrap();
        assert_eq!(event, Event::msg(Role::Assistant, "not json at all"));
        assert!(coord.next().is_none());
    }

    #[test]
    fn s3_malformed_json_under_explicit_claude_yields_error() {
        let options = StreamOptions {
            vendor: Some("claude".to_string()),
            ..Default::default()
        };
        let mut coord = coordinator("not json at all", options);
        let event = coord.next().unwrap().unwrap();
        match event {
            Event::Error { message } => {
                assert!(message.starts_with("Line 1: Invalid JSON"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(coord.next().is_none());
    }

    #[test]
    fn s4_amp_tool_lifecycle() {
        let input = [
            r#"{"phase":"start","task":"build"}"#,
            r#"{"phase":"output","task":"build","type":"stdout","content":"hello"}"#,
            r#"{"phase":"end","task":"build","exitCode":0}"#,
        ]
        .join("\n");
        let options = StreamOptions {
            vendor: Some("amp".to_string()),
            ..Default::default()
        };
        let mut coord = coordinator(&input, options);
        let events: Vec<Event> = coord.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], Event::Tool { phase: crate::events::ToolPhase::Start, .. }));
        assert!(matches!(&events[1], Event::Tool { phase: crate::events::ToolPhase::Stdout, .. }));
        assert!(matches!(&events[2], Event::Tool { phase: crate::events::ToolPhase::End, exit_code: Some(0), .. }));
    }

    #[test]
    fn s5_consecutive_error_cap_is_fatal() {
        let input = "not json\nnot json\nnot json\n";
        let options = StreamOptions {
            vendor: Some("claude".to_string()),
            max_consecutive_errors: 3,
            ..Default::default()
        };
        let mut coord = coordinator(input, options);
        let mut error_events = 0;
        let mut fatal = None;
        loop {
            match coord.next() {
                Some(Ok(Event::Error { .. })) => error_events += 1,
                Some(Err(e)) => {
                    fatal = Some(e);
                    break;
                }
                Some(Ok(other)) => panic!("unexpected event: {other:?}"),
                None => panic!("stream ended without fatal error"),
            }
        }
        assert_eq!(error_events, 3);
        let fatal = fatal.unwrap();
        assert!(fatal.to_string().contains("Stopped after 3 consecutive errors"));
    }

    #[test]
    fn continue_on_error_false_propagates_immediately() {
        let options = StreamOptions {
            vendor: Some("claude".to_string()),
            continue_on_error: false,
            ..Default::default()
        };
        let mut coord = coordinator("not json\nmore json\n", options);
        assert!(matches!(coord.next(), Some(Ok(Event::Error { .. }))));
        assert!(matches!(coord.next(), Some(Err(CoordinatorError::Parse(_)))));
        assert!(coord.next().is_none());
    }

    #[test]
    fn single_malformed_line_does_not_block_subsequent_valid_lines() {
        let input = "not json\n{\"type\":\"message\",\"role\":\"user\",\"content\":\"hi\"}\n";
        let options = StreamOptions {
            vendor: Some("claude".to_string()),
            ..Default::default()
        };
        let mut coord = coordinator(input, options);
        assert!(matches!(coord.next(), Some(Ok(Event::Error { .. }))));
        assert_eq!(coord.next().unwrap().unwrap(), Event::msg(Role::User, "hi"));
    }

    #[test]
    fn emit_debug_events_announces_vendor_once_and_summarizes_at_end() {
        let input = r#"{"type":"message","role":"user","content":"hi"}"#;
        let options = StreamOptions {
            vendor: Some("claude".to_string()),
            emit_debug_events: true,
            ..Default::default()
        };
        let mut coord = coordinator(input, options);
        let events: Vec<Event> = coord.by_ref().map(|r| r.unwrap()).collect();
        assert!(matches!(&events[0], Event::Debug { .. }));
        assert!(matches!(&events[1], Event::Msg { .. }));
        assert!(matches!(&events[2], Event::Debug { .. }));
    }

    #[test]
    fn empty_source_yields_no_summary_even_with_emit_debug_events() {
        let options = StreamOptions {
            vendor: Some("claude".to_string()),
            emit_debug_events: true,
            ..Default::default()
        };
        let mut coord = coordinator("", options);
        assert!(coord.next().is_none());
    }

    #[test]
    fn auto_vendor_detection_failure_is_fatal_when_unclassifiable() {
        // Build a registry with no Gemini catch-all so detection can genuinely fail.
        let registry = Arc::new(ParserRegistry::new());
        registry
            .register(Box::new(crate::vendors::claude::ClaudeParser::default()), 100.0)
            .unwrap();
        let mut coord = StreamingCoordinator::new(
            Cursor::new(b"not json\n".to_vec()),
            registry,
            StreamOptions::default(),
        );
        assert!(matches!(
            coord.next(),
            Some(Err(CoordinatorError::Detection(_)))
        ));
    }

    #[test]
    fn unknown_explicit_vendor_is_fatal() {
        let options = StreamOptions {
            vendor: Some("nonexistent".to_string()),
            ..Default::default()
        };
        let mut coord = coordinator("anything\n", options);
        assert!(matches!(
            coord.next(),
            Some(Err(CoordinatorError::Detection(_)))
        ));
    }

    #[test]
    fn vendor_stickiness_does_not_redetect_after_first_line() {
        // Claude bound on line 1; line 2 wouldn't match Claude's detect on
        // its own, but stickiness means it's still routed through Claude's
        // parser rather than being re-detected as Gemini.
        let input = "{\"type\":\"message\",\"role\":\"user\",\"content\":\"hi\"}\nnot json at all\n";
        let mut coord = coordinator(input, StreamOptions::default());
        assert_eq!(coord.next().unwrap().unwrap(), Event::msg(Role::User, "hi"));
        // Second line fails Claude's JSON parse and surfaces as an error,
        // proving it was NOT silently adopted by Gemini.
        assert!(matches!(coord.next(), Some(Ok(Event::Error { .. }))));
    }
}
