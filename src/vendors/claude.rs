//! Claude vendor parser — JSON objects discriminated by top-level `type`.
//!
//! `detect` only recognizes the five classified `type` values (`message`,
//! `tool_use`, `tool_result`, `usage`, `error`); this keeps auto-detection
//! from claiming lines that belong to Amp (keyed by `phase`, not `type`).
//! `parse`, once a line is actually handed to this vendor (either because
//! `detect` matched or because the caller pinned `vendor=claude` directly),
//! is permissive: any other `type` value demotes to a single `debug` event
//! rather than erroring.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::errors::ParseError;
use crate::events::{Event, Role, ToolPhase};
use crate::registry::VendorParser;

const RECOGNIZED_TYPES: &[&str] = &["message", "tool_use", "tool_result", "usage", "error"];

/// Stateful only in the sense required by the wire protocol itself: Claude
/// correlates a `tool_result`'s `tool_use_id` back to the tool name
/// announced by the matching `tool_use`. A single line's translation is
/// still a deterministic function of (that line, everything already seen on
/// this stream) — no different from, say, a stateful XML parser tracking
/// open tags.
pub struct ClaudeParser {
    tool_names: Mutex<HashMap<String, String>>,
}

impl Default for ClaudeParser {
    fn default() -> Self {
        Self {
            tool_names: Mutex::new(HashMap::new()),
        }
    }
}

impl ClaudeParser {
    fn recognized_type(line: &str) -> Option<String> {
        let value: Value = serde_json::from_str(line).ok()?;
        let type_str = value.get("type")?.as_str()?;
        if RECOGNIZED_TYPES.contains(&type_str) {
            Some(type_str.to_string())
        } else {
            None
        }
    }

    fn parse_message(&self, value: &Value) -> Result<Vec<Event>, ParseError> {
        let role = value.get("role").and_then(Value::as_str);
        let content = value.get("content").and_then(Value::as_str);
        match (role, content) {
            (Some(role_str), Some(text)) => {
                let role = match role_str {
                    "user" => Role::User,
                    "assistant" => Role::Assistant,
                    "system" => Role::System,
                    other => {
                        return Ok(vec![Event::debug(
                            serde_json::json!({"type": "message", "unrecognizedRole": other, "content": text}),
                        )]);
                    }
                };
                Ok(vec![Event::msg(role, text)])
            }
            _ => Ok(vec![Event::debug(value.clone())]),
        }
    }

    fn parse_tool_use(&self, value: &Value) -> Result<Vec<Event>, ParseError> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::new("claude", "tool_use missing name", &value.to_string()))?;
        let id = value.get("id").and_then(Value::as_str);
        if let Some(id) = id {
            self.tool_names
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(id.to_string(), name.to_string());
        }
        let text = value.get("input").map(|input| input.to_string());
        Ok(vec![Event::tool_start(name, text)])
    }

    fn parse_tool_result(&self, value: &Value) -> Result<Vec<Event>, ParseError> {
        let tool_use_id = value.get("tool_use_id").and_then(Value::as_str).ok_or_else(|| {
            ParseError::new("claude", "tool_result missing tool_use_id", &value.to_string())
        })?;
        let name = self
            .tool_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(tool_use_id)
            .cloned()
            .unwrap_or_else(|| tool_use_id.to_string());

        let content_text = match value.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let mut events = vec![Event::tool_output(&name, ToolPhase::Stdout, content_text)];

        let exit_code = value
            .get("exit_code")
            .and_then(Value::as_i64)
            .or_else(|| value.get("is_error").and_then(Value::as_bool).map(i64::from));
        if let Some(exit_code) = exit_code {
            events.push(Event::tool_end(&name, Some(exit_code)));
        }
        Ok(events)
    }

    fn parse_usage(&self, value: &Value) -> Result<Vec<Event>, ParseError> {
        let delta_usd = value.get("delta_usd").and_then(Value::as_f64);
        let input_tokens = value.get("input_tokens").and_then(Value::as_f64).unwrap_or(0.0);
        let output_tokens = value.get("output_tokens").and_then(Value::as_f64).unwrap_or(0.0);

        match delta_usd {
            Some(delta) => Ok(vec![Event::cost(delta)]),
            None if input_tokens == 0.0 && output_tokens == 0.0 => Ok(vec![]),
            None => Ok(vec![Event::cost(0.0)]),
        }
    }
}

impl VendorParser for ClaudeParser {
    fn vendor(&self) -> &str {
        "claude"
    }

    fn detect(&self, line: &str) -> bool {
        if !line.contains("\"type\"") {
            return false;
        }
        Self::recognized_type(line).is_some()
    }

    fn parse(&self, line: &str) -> Result<Vec<Event>, ParseError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| ParseError::new("claude", "Invalid JSON", line).with_cause(e))?;

        let Some(type_str) = value.get("type").and_then(Value::as_str) else {
            return Err(ParseError::new(
                "claude",
                "missing or non-string \"type\" field",
                line,
            ));
        };

        match type_str {
            "message" => self.parse_message(&value),
            "tool_use" => self.parse_tool_use(&value),
            "tool_result" => self.parse_tool_result(&value),
            "usage" => self.parse_usage(&value),
            "error" => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                Ok(vec![Event::error(message)])
            }
            _ => Ok(vec![Event::debug(value)]),
        }
    }

    fn doc_url(&self) -> Option<&str> {
        Some("https://docs.anthropic.com/claude/reference/claude-on-the-cli")
    }
}
