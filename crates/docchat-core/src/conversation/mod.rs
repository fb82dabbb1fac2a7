//! Conversation state and the controller that drives it.
//!
//! [`ConversationController`] owns the transcript for one session, runs sends
//! and uploads through a [`ChatTransport`](crate::transport::ChatTransport),
//! and publishes a [`ConversationUpdate`] on the [`EventBus`](crate::event_bus::EventBus)
//! for every change.

mod controller;
mod message;
mod turn;

pub use controller::{error_text, ConversationController, UPDATE_TOPIC};
pub use message::{ChatMessage, Role};
pub use turn::{TurnId, TurnState};

use serde::Serialize;

use crate::chart::ChartConfig;
use crate::session::SessionId;

/// A single observable change to conversation state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConversationUpdate {
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        session_id: SessionId,
    },
    /// The transcript was replaced wholesale (new chat).
    MessagesReset {
        messages: Vec<ChatMessage>,
    },
    MessageAppended {
        index: usize,
        message: ChatMessage,
    },
    /// Streamed text appended to an assistant message.
    TokenAppended {
        index: usize,
        token: String,
    },
    /// A message's text was replaced.
    MessageUpdated {
        index: usize,
        text: String,
    },
    MessageRemoved {
        index: usize,
    },
    Chart {
        config: ChartConfig,
    },
    ChartCleared,
    ChartCollapsed {
        collapsed: bool,
    },
    #[serde(rename_all = "camelCase")]
    Turn {
        turn_id: TurnId,
        state: TurnState,
    },
    Loading {
        loading: bool,
    },
    Error {
        message: Option<String>,
    },
    UploadProgress {
        percent: Option<u8>,
    },
}
