//! ANSI renderer (§4.D.3) — color-escaped text for a terminal.
//!
//! Tool parameter summaries follow the teacher's `format_tool_args`/
//! `format_tool_executing` (`src/events.rs`): pull a handful of relevant
//! fields per tool, truncate long strings, join as `key=value`. The
//! teacher's icons/duration thresholds are adapted the same way.

use colored::{Color, Colorize};
use serde_json::Value;

use super::markdown::{MarkdownStyle, render_inline};
use super::{RenderOptions, Renderer, ToolTracker, format_duration};
use crate::events::{Event, Role, ToolPhase, display_delta_usd};

/// Tools with a custom one-line parameter summary (SPEC_FULL §9 OQ-1: a
/// non-normative convenience list, not a data contract).
const RECOGNIZED_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "Bash",
    "Glob",
    "Grep",
    "LS",
    "WebFetch",
    "WebSearch",
    "Task",
    "TodoWrite",
    "NotebookRead",
    "MultiEdit",
];

const PARAM_SUMMARY_TRUNCATION: usize = 80;

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_len).collect();
    format!("{truncated}...")
}

/// Name-aware per-tool parameter summary, shared with the HTML renderer
/// (§4.D.4: "parameter extraction mirrors the ANSI renderer").
pub(super) fn tool_param_summary(name: &str, input: &Value) -> Option<String> {
    if !RECOGNIZED_TOOLS.contains(&name) {
        let (key, value) = input.as_object()?.iter().next()?;
        return Some(truncate(&format!("{key}={value}"), PARAM_SUMMARY_TRUNCATION));
    }
    let field = |k: &str| input.get(k).and_then(Value::as_str);
    match name {
        "Read" | "LS" | "NotebookRead" | "MultiEdit" | "Edit" | "Write" => {
            field("path").or_else(|| field("file_path")).map(str::to_string)
        }
        "Bash" => field("command").map(|c| truncate(c, PARAM_SUMMARY_TRUNCATION)),
        "Glob" => field("pattern").map(str::to_string),
        "Grep" => {
            let pattern = field("pattern")?;
            Some(match field("path") {
                Some(path) => format!("\"{pattern}\" in {path}"),
                None => format!("\"{pattern}\""),
            })
        }
        "WebFetch" => field("url").map(str::to_string),
        "WebSearch" => field("query").map(|q| format!("\"{q}\"")),
        "Task" => field("description").map(str::to_string),
        "TodoWrite" => {
            let count = input.get("todos").and_then(Value::as_array).map_or(0, Vec::len);
            Some(format!("({count} item{})", if count == 1 { "" } else { "s" }))
        }
        _ => None,
    }
}

fn role_icon_and_color(role: Role) -> (&'static str, Color) {
    match role {
        Role::User => ("👤", Color::Cyan),
        Role::Assistant => ("🤖", Color::Green),
        Role::System => ("⚙️", Color::Yellow),
    }
}

fn neutralize_escape(text: &str) -> String {
    text.replace('\x1b', "\\x1b")
}

/// Render a debug payload defensively: `serde_json::Value` is a tree (no
/// cycles are actually reachable), but the fallback path mirrors the
/// upstream "safe stringifier" contract for any future value type that
/// might not be.
fn safe_debug_string(raw: &Value) -> String {
    serde_json::to_string_pretty(raw)
        .unwrap_or_else(|e| format!("[Error stringifying object: {e}]"))
}

pub struct AnsiRenderer {
    options: RenderOptions,
    tracker: ToolTracker,
}

impl AnsiRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            tracker: ToolTracker::new(),
        }
    }

    fn maybe_timestamp(&self) -> String {
        if self.options.show_timestamps {
            format!("{} ", self.options.timestamp().dimmed())
        } else {
            String::new()
        }
    }

    fn style(&self) -> MarkdownStyle<'static> {
        let disabled = self.options.color_disabled;
        MarkdownStyle {
            code: if disabled {
                &|s: &str| format!("`{s}`")
            } else {
                &|s: &str| s.on_black().white().to_string()
            },
            bold: if disabled {
                &|s: &str| s.to_string()
            } else {
                &|s: &str| s.bold().to_string()
            },
            italic: if disabled {
                &|s: &str| s.to_string()
            } else {
                &|s: &str| s.italic().to_string()
            },
        }
    }

    fn render_msg(&self, role: Role, text: &str) -> String {
        let (icon, color) = role_icon_and_color(role);
        let safe_text = neutralize_escape(text);
        let body = render_inline(&safe_text, &self.style());
        let label = format!("{role:?}").to_lowercase();
        let label = if self.options.color_disabled {
            format!("{label}:")
        } else {
            format!("{}:", label.color(color).bold())
        };
        format!("{}{icon} {label} {body}\n", self.maybe_timestamp())
    }

    fn render_tool(
        &mut self,
        name: &str,
        phase: ToolPhase,
        text: Option<&str>,
        exit_code: Option<i64>,
    ) -> String {
        match phase {
            ToolPhase::Start => {
                self.tracker.start(name, self.options.collapse_tools);
                let input: Value = text
                    .and_then(|t| serde_json::from_str(t).ok())
                    .unwrap_or(Value::Null);
                let summary = tool_param_summary(name, &input);
                let colored_name = if self.options.color_disabled {
                    name.to_string()
                } else {
                    name.cyan().to_string()
                };
                match summary {
                    Some(summary) => format!("🔧 {colored_name} {summary}\n"),
                    None => format!("🔧 {colored_name}\n"),
                }
            }
            ToolPhase::Stdout | ToolPhase::Stderr => {
                let text = text.unwrap_or("");
                if self.tracker.record_output(name, text) {
                    return String::new();
                }
                let prefix = "  │ ";
                let line = if matches!(phase, ToolPhase::Stderr) && !self.options.color_disabled {
                    format!("{prefix}{}", text.red())
                } else {
                    format!("{prefix}{text}")
                };
                format!("{line}\n")
            }
            ToolPhase::End => {
                let success = exit_code.is_none_or(|c| c == 0);
                let icon = if success { "✅" } else { "❌" };
                let summary = self.tracker.end(name);
                let duration = summary.as_ref().map(|s| s.duration);
                let duration_str = duration.map(format_duration).unwrap_or_default();
                match summary.and_then(|s| s.collapsed_output.map(|out| (out, s.line_count))) {
                    Some((out, count)) => {
                        format!("{icon} {name} completed {duration_str} ({count} lines)\n  {out}\n")
                    }
                    None => format!("{icon} {name} completed {duration_str}\n"),
                }
            }
        }
    }

    fn render_cost(&self, delta_usd: f64) -> String {
        format!("💰 ${:.4}\n", display_delta_usd(delta_usd))
    }

    fn render_error(&self, message: &str) -> String {
        let line = format!("error: {message}");
        let line = if self.options.color_disabled {
            line
        } else {
            line.red().to_string()
        };
        format!("{line}\n")
    }

    fn render_debug(&self, raw: &Value) -> String {
        format!("debug: {}\n", safe_debug_string(raw))
    }
}

impl Renderer for AnsiRenderer {
    fn render(&mut self, event: &Event) -> String {
        if self.options.is_hidden(event) {
            return String::new();
        }
        match event {
            Event::Msg { role, text } => self.render_msg(*role, text),
            Event::Tool {
                name,
                phase,
                text,
                exit_code,
            } => self.render_tool(name, *phase, text.as_deref(), *exit_code),
            Event::Cost { delta_usd } => self.render_cost(*delta_usd),
            Event::Error { message } => self.render_error(message),
            Event::Debug { raw } => self.render_debug(raw),
        }
    }

    fn flush(&mut self) -> String {
        let interrupted = self.tracker.drain_interrupted();
        interrupted
            .into_iter()
            .map(|name| format!("⚠️  tool \"{name}\" was interrupted before completion\n"))
            .collect()
    }
}
