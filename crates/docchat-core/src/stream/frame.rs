//! Wire-level frames.
//!
//! A frame is the text between two blank-line boundaries:
//!
//! ```text
//! event: chart
//! data: {"chartType":"bar"}
//! ```
//!
//! Only `event:` and `data:` lines are meaningful. Anything else (comments,
//! `id:`, keep-alives) is ignored.

/// Event type assumed when a frame has no `event:` line.
pub const DEFAULT_EVENT: &str = "message";

const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    /// Parse one frame block (without its trailing boundary).
    ///
    /// Values are trimmed. A repeated `data:` line overwrites the previous
    /// one rather than being joined.
    pub fn parse(block: &str) -> Self {
        let mut frame = Frame {
            event: DEFAULT_EVENT.to_string(),
            data: String::new(),
        };

        for line in block.split('\n') {
            if let Some(value) = line.strip_prefix(EVENT_PREFIX) {
                frame.event = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix(DATA_PREFIX) {
                frame.data = value.trim().to_string();
            }
        }

        frame
    }

    pub fn is_default_event(&self) -> bool {
        self.event == DEFAULT_EVENT
    }
}
