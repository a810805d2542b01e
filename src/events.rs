//! The normalized event model.
//!
//! Every vendor parser translates its native format into this single
//! discriminated union. The wire shape (`t`/`role`/`phase` discriminators)
//! is fixed by the external contract; internally we model it as a tagged
//! `enum` and (de)serialize at the boundary, per the design note on tagged
//! unions in place of discriminator strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a [`Event::Msg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Where a [`Event::Tool`] sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPhase {
    Start,
    Stdout,
    Stderr,
    End,
}

/// A normalized event, tagged by `t` on the wire.
///
/// `debug.raw` is left as an opaque [`Value`] and threaded through
/// untouched; no schema is imposed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "lowercase")]
pub enum Event {
    Msg {
        role: Role,
        text: String,
    },
    Tool {
        name: String,
        phase: ToolPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(rename = "exitCode", skip_serializing_if = "Option::is_none")]
        exit_code: Option<i64>,
    },
    Cost {
        #[serde(rename = "deltaUsd")]
        delta_usd: f64,
    },
    Error {
        message: String,
    },
    Debug {
        raw: Value,
    },
}

impl Event {
    /// The event's tag, as it appears on the wire (`"msg"`, `"tool"`, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            Event::Msg { .. } => "msg",
            Event::Tool { .. } => "tool",
            Event::Cost { .. } => "cost",
            Event::Error { .. } => "error",
            Event::Debug { .. } => "debug",
        }
    }

    pub fn msg(role: Role, text: impl Into<String>) -> Self {
        Event::Msg {
            role,
            text: text.into(),
        }
    }

    pub fn tool_start(name: impl Into<String>, text: Option<String>) -> Self {
        Event::Tool {
            name: name.into(),
            phase: ToolPhase::Start,
            text,
            exit_code: None,
        }
    }

    pub fn tool_output(name: impl Into<String>, phase: ToolPhase, text: impl Into<String>) -> Self {
        debug_assert!(matches!(phase, ToolPhase::Stdout | ToolPhase::Stderr));
        Event::Tool {
            name: name.into(),
            phase,
            text: Some(text.into()),
            exit_code: None,
        }
    }

    pub fn tool_end(name: impl Into<String>, exit_code: Option<i64>) -> Self {
        Event::Tool {
            name: name.into(),
            phase: ToolPhase::End,
            text: None,
            exit_code,
        }
    }

    pub fn cost(delta_usd: f64) -> Self {
        // NaN/Infinity are normalized to zero at display time (per renderer),
        // not here: the event itself preserves whatever the vendor reported.
        Event::Cost { delta_usd }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }

    pub fn debug(raw: Value) -> Self {
        Event::Debug { raw }
    }
}

/// `deltaUsd` coerced for display: `NaN`/`±Infinity` normalize to `0.0`,
/// everything else (including negatives) passes through unchanged.
pub fn display_delta_usd(delta_usd: f64) -> f64 {
    if delta_usd.is_finite() { delta_usd } else { 0.0 }
}
