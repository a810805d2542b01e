//! Gemini vendor parser — absorbs everything else.
//!
//! Gemini treats free text as a first-class citizen: any line that isn't
//! valid JSON, or is JSON but not one of its two recognized shapes, becomes
//! `msg{role=assistant}`. This is the "adoption rule" (SPEC_FULL §9 /
//! design notes): under `auto`, malformed output from a misdetected Claude
//! or Amp stream silently becomes a Gemini assistant message rather than
//! surfacing as an error. That is intentional upstream behavior, preserved
//! here rather than "fixed".
//!
//! Because of the adoption rule, `detect` always returns `true` — Gemini is
//! the catch-all at the bottom of the default priority order.

use serde_json::Value;

use crate::errors::ParseError;
use crate::events::{Event, Role};
use crate::registry::VendorParser;

#[derive(Default)]
pub struct GeminiParser;

impl GeminiParser {
    fn parse_json(&self, value: Value, line: &str) -> Vec<Event> {
        let type_str = value.get("type").and_then(Value::as_str);
        match type_str {
            Some("user") | Some("assistant") => {
                let role = if type_str == Some("user") { Role::User } else { Role::Assistant };
                match value.get("content").and_then(Value::as_str) {
                    Some(text) => vec![Event::msg(role, text)],
                    None => vec![Event::msg(Role::Assistant, line)],
                }
            }
            Some("metadata") => {
                let delta = value
                    .get("delta_usd")
                    .or_else(|| value.get("cost"))
                    .and_then(Value::as_f64);
                match delta {
                    Some(delta) => vec![Event::cost(delta)],
                    None => vec![Event::debug(value)],
                }
            }
            _ => vec![Event::debug(value)],
        }
    }
}

impl VendorParser for GeminiParser {
    fn vendor(&self) -> &str {
        "gemini"
    }

    fn detect(&self, _line: &str) -> bool {
        true
    }

    fn parse(&self, line: &str) -> Result<Vec<Event>, ParseError> {
        // Never raises: anything that isn't a recognized JSON shape is
        // absorbed as free-text assistant output, per the adoption rule.
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Ok(self.parse_json(Value::Object(map), line)),
            _ => Ok(vec![Event::msg(Role::Assistant, line)]),
        }
    }

    fn confidence(&self, line: &str) -> Option<(f64, String)> {
        let is_recognized_json = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_string))
            .is_some_and(|t| matches!(t.as_str(), "user" | "assistant" | "metadata"));
        if is_recognized_json {
            Some((0.7, "recognized Gemini JSON shape".to_string()))
        } else {
            Some((0.1, "unclassified, adopted by Gemini".to_string()))
        }
    }
}
