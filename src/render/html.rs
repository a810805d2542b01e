//! HTML renderer (§4.D.4) — semantic fragments, not a full document.
//! Document wrapping (DOCTYPE, `<style>`) is the surrounding CLI's job
//! per §6.5.

use serde_json::Value;

use super::ansi::tool_param_summary;
use super::markdown::{MarkdownStyle, render_inline};
use super::{RenderOptions, Renderer, ToolTracker, format_duration};
use crate::events::{Event, Role, ToolPhase, display_delta_usd};

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn role_class(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

pub struct HtmlRenderer {
    options: RenderOptions,
    tracker: ToolTracker,
}

impl HtmlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            tracker: ToolTracker::new(),
        }
    }

    fn style(&self) -> MarkdownStyle<'static> {
        MarkdownStyle {
            code: &|s: &str| format!("<code>{}</code>", escape_html(s)),
            bold: &|s: &str| format!("<strong>{s}</strong>"),
            italic: &|s: &str| format!("<em>{s}</em>"),
        }
    }

    fn maybe_timestamp_attr(&self) -> String {
        if self.options.show_timestamps {
            format!(" data-timestamp=\"{}\"", self.options.timestamp())
        } else {
            String::new()
        }
    }

    fn render_msg(&self, role: Role, text: &str) -> String {
        let escaped = escape_html(text);
        let body = render_inline(&escaped, &self.style()).replace('\n', "<br>");
        format!(
            "<div class=\"message message-{}\"{}>{}</div>\n",
            role_class(role),
            self.maybe_timestamp_attr(),
            body
        )
    }

    fn render_tool(
        &mut self,
        name: &str,
        phase: ToolPhase,
        text: Option<&str>,
        exit_code: Option<i64>,
    ) -> String {
        let escaped_name = escape_html(name);
        match phase {
            ToolPhase::Start => {
                self.tracker.start(name, self.options.collapse_tools);
                let input: Value = text
                    .and_then(|t| serde_json::from_str(t).ok())
                    .unwrap_or(Value::Null);
                let summary = tool_param_summary(name, &input)
                    .map(|s| escape_html(&s))
                    .unwrap_or_default();
                format!(
                    "<div class=\"tool-execution tool-start\" data-tool=\"{escaped_name}\">{escaped_name} {summary}</div>\n"
                )
            }
            ToolPhase::Stdout | ToolPhase::Stderr => {
                let text = text.unwrap_or("");
                if self.tracker.record_output(name, text) {
                    return String::new();
                }
                let class = if matches!(phase, ToolPhase::Stderr) {
                    "tool-output tool-stderr"
                } else {
                    "tool-output tool-stdout"
                };
                format!(
                    "<div class=\"tool-execution {class}\" data-tool=\"{escaped_name}\">{}</div>\n",
                    escape_html(text)
                )
            }
            ToolPhase::End => {
                let success = exit_code.is_none_or(|c| c == 0);
                let status_class = if success { "success" } else { "error" };
                let summary = self.tracker.end(name);
                let duration = summary
                    .as_ref()
                    .map(|s| format_duration(s.duration))
                    .unwrap_or_default();
                let detail = summary
                    .and_then(|s| s.collapsed_output)
                    .map(|out| format!("<pre>{}</pre>", escape_html(&out)))
                    .unwrap_or_default();
                format!(
                    "<div class=\"tool-execution tool-end {status_class}\" data-tool=\"{escaped_name}\">{escaped_name} completed {duration}{detail}</div>\n"
                )
            }
        }
    }

    fn render_cost(&self, delta_usd: f64) -> String {
        let value = display_delta_usd(delta_usd);
        let sign = if value < 0.0 { "-" } else { "" };
        format!("<div class=\"cost-info\">${sign}{:.4}</div>\n", value.abs())
    }

    fn render_error(&self, message: &str) -> String {
        format!("<div class=\"error-message\">{}</div>\n", escape_html(message))
    }

    fn render_debug(&self, raw: &Value) -> String {
        let body = serde_json::to_string_pretty(raw)
            .unwrap_or_else(|e| format!("[Error stringifying object: {e}]"));
        format!("<div class=\"debug-info\"><pre>{}</pre></div>\n", escape_html(&body))
    }
}

impl Renderer for HtmlRenderer {
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
            .map(|name| {
                format!(
                    "<div class=\"tool-interrupted\">tool \"{}\" was interrupted before completion</div>\n",
                    escape_html(&name)
                )
            })
            .collect()
    }
}
