//! JSON renderer (§4.D.5) — emits normalized events verbatim, in one of
//! two modes: compact newline-delimited JSON, or pretty-printed with a
//! blank-line separator. No narrative formatting; tool-lifecycle tracking
//! is maintained purely so `flush` stays consistent with the other
//! renderers.

use serde_json::Value;

use super::{RenderOptions, Renderer, ToolTracker};
use crate::events::{Event, ToolPhase};

pub struct JsonRenderer {
    options: RenderOptions,
    tracker: ToolTracker,
}

impl JsonRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            tracker: ToolTracker::new(),
        }
    }

    fn track(&mut self, event: &Event) {
        let Event::Tool { name, phase, text, .. } = event else {
            return;
        };
        match phase {
            ToolPhase::Start => self.tracker.start(name, self.options.collapse_tools),
            ToolPhase::Stdout | ToolPhase::Stderr => {
                self.tracker.record_output(name, text.as_deref().unwrap_or(""));
            }
            ToolPhase::End => {
                self.tracker.end(name);
            }
        }
    }

    fn serialize(&self, value: &Value) -> String {
        if self.options.compact_mode {
            format!("{value}\n")
        } else {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            format!("{pretty}\n\n")
        }
    }
}

impl Renderer for JsonRenderer {
    fn render(&mut self, event: &Event) -> String {
        self.track(event);
        if self.options.is_hidden(event) {
            return String::new();
        }
        let mut value = serde_json::to_value(event).unwrap_or(Value::Null);
        if self.options.show_timestamps {
            if let Value::Object(ref mut map) = value {
                map.insert("timestamp".to_string(), Value::String(self.options.timestamp()));
            }
        }
        self.serialize(&value)
    }

    fn flush(&mut self) -> String {
        let interrupted = self.tracker.drain_interrupted();
        interrupted
            .into_iter()
            .map(|name| {
                let value = serde_json::json!({"t": "debug", "raw": {"toolInterrupted": name}});
                self.serialize(&value)
            })
            .collect()
    }
}
