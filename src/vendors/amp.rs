//! Amp vendor parser — JSON objects discriminated by top-level `phase`.
//!
//! `detect` uses a cheap substring pre-check (`"phase"`) before parsing, to
//! avoid paying for a JSON decode on lines that plainly aren't Amp's.

use serde_json::Value;

use crate::errors::ParseError;
use crate::events::{Event, ToolPhase};
use crate::registry::VendorParser;

#[derive(Default)]
pub struct AmpParser;

impl AmpParser {
    fn parse_start(&self, value: &Value) -> Result<Vec<Event>, ParseError> {
        let task = value
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::new("amp", "phase=start missing task", &value.to_string()))?;
        Ok(vec![Event::tool_start(task, None)])
    }

    fn parse_output(&self, value: &Value) -> Result<Vec<Event>, ParseError> {
        let task = value
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::new("amp", "phase=output missing task", &value.to_string()))?;
        let output_type = value.get("type").and_then(Value::as_str).ok_or_else(|| {
            ParseError::new("amp", "phase=output missing type", &value.to_string())
        })?;
        let phase = match output_type {
            "stdout" => ToolPhase::Stdout,
            "stderr" => ToolPhase::Stderr,
            other => {
                return Err(ParseError::new(
                    "amp",
                    format!("phase=output has unrecognized type \"{other}\""),
                    &value.to_string(),
                ));
            }
        };
        let content = value.get("content").and_then(Value::as_str).unwrap_or("");
        Ok(vec![Event::tool_output(task, phase, content)])
    }

    fn parse_end(&self, value: &Value) -> Result<Vec<Event>, ParseError> {
        let task = value
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::new("amp", "phase=end missing task", &value.to_string()))?;
        let exit_code = value
            .get("exitCode")
            .and_then(Value::as_i64)
            .or_else(|| value.get("exit_code").and_then(Value::as_i64))
            .or_else(|| {
                value.get("status").and_then(Value::as_str).map(|status| {
                    if status.eq_ignore_ascii_case("ok") || status.eq_ignore_ascii_case("success") {
                        0
                    } else {
                        1
                    }
                })
            });
        Ok(vec![Event::tool_end(task, exit_code)])
    }
}

impl VendorParser for AmpParser {
    fn vendor(&self) -> &str {
        "amp"
    }

    fn detect(&self, line: &str) -> bool {
        if !line.contains("\"phase\"") {
            return false;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            return false;
        };
        value.get("phase").and_then(Value::as_str).is_some()
    }

    fn parse(&self, line: &str) -> Result<Vec<Event>, ParseError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| ParseError::new("amp", "Invalid JSON", line).with_cause(e))?;

        let Some(phase) = value.get("phase").and_then(Value::as_str) else {
            return Err(ParseError::new("amp", "missing or non-string \"phase\" field", line));
        };

        match phase {
            "start" => self.parse_start(&value),
            "output" => self.parse_output(&value),
            "end" => self.parse_end(&value),
            _ => Ok(vec![Event::debug(value)]),
        }
    }
}
