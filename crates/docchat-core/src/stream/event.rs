//! Typed stream events and frame promotion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::Frame;
use crate::error::ParseError;

/// A decoded, semantic event from a response stream.
///
/// `Complete` and `Error` are terminal: nothing follows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A piece of assistant text.
    Token(String),
    /// A chart description for the renderer.
    Chart(Value),
    /// The backend finished the answer.
    Complete(Value),
    /// The answer failed.
    Error(Value),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete(_) | StreamEvent::Error(_))
    }

    /// Completion synthesized when the transport ends without a terminal frame.
    pub fn finished_without_terminal() -> Self {
        StreamEvent::Complete(serde_json::json!({ "message": "Stream finished (done)" }))
    }
}

/// Error payload for a body read that fails mid-stream.
pub fn read_failure_payload(detail: impl std::fmt::Display) -> Value {
    serde_json::json!({
        "message": "Stream reading error.",
        "detail": detail.to_string(),
    })
}

impl Frame {
    /// Promote a frame to a [`StreamEvent`].
    ///
    /// Returns `None` for frames that are dropped: a non-default event type
    /// whose payload is not valid JSON.
    pub fn into_event(self) -> Option<StreamEvent> {
        let parsed = match serde_json::from_str::<Value>(&self.data) {
            Ok(value) => value,
            Err(source) => {
                let err = ParseError::InvalidJson {
                    event: self.event.clone(),
                    raw: self.data.clone(),
                    source,
                };
                log::warn!("{}", err);
                if self.is_default_event() {
                    return Some(StreamEvent::Token(self.data));
                }
                log::warn!("Dropping '{}' frame with unparseable payload", self.event);
                return None;
            }
        };

        let event = match self.event.as_str() {
            "chart" => StreamEvent::Chart(parsed),
            "complete" => StreamEvent::Complete(parsed),
            "error" => StreamEvent::Error(parsed),
            // Default and unknown event types carry tokens.
            _ => {
                if parsed.get("type").and_then(Value::as_str) == Some("token") {
                    let data = parsed.get("data").cloned().unwrap_or(Value::Null);
                    StreamEvent::Token(token_text(data))
                } else {
                    log::debug!("Token frame without token envelope: {}", parsed);
                    StreamEvent::Token(token_text(parsed))
                }
            }
        };
        Some(event)
    }
}

/// Render a JSON value as the text appended to the assistant message.
fn token_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
