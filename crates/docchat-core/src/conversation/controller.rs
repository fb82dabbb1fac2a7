//! Conversation controller.
//!
//! Drives one chat session: new chat, uploads, and streamed answers. The
//! controller is single-threaded; callers pump the active stream with
//! [`ConversationController::pump`] or [`ConversationController::run_until_idle`]
//! and observe changes either through the accessors or by subscribing to the
//! event bus.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::chart::{ChartConfig, ChartRenderer};
use crate::error::{StreamError, TransportError, UploadError};
use crate::event_bus::EventBus;
use crate::session::SessionId;
use crate::stream::{ByteStream, EventStream, StreamEvent};
use crate::transport::{ChatTransport, UploadEvent, UploadResponse};

use super::{ChatMessage, ConversationUpdate, TurnId, TurnState};

/// Event type prefix for published updates; the session id is appended.
pub const UPDATE_TOPIC: &str = "chat:update";

const SESSION_STARTED: &str = "New chat session started. Upload documents to begin.";
const SESSION_FAILED: &str = "Failed to start a new chat session. Please try again.";
const NO_SESSION_FOR_SEND: &str = "No active session. Cannot send message.";
const DEFAULT_STREAM_ERROR: &str = "An error occurred during streaming.";

/// Human-readable text for an `error` event payload.
///
/// Looks at `message`, then `detail.message`, then `error`.
pub fn error_text(payload: &Value) -> String {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    non_empty(payload.get("message"))
        .or_else(|| non_empty(payload.pointer("/detail/message")))
        .or_else(|| non_empty(payload.get("error")))
        .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string())
}

/// The send currently in flight.
struct ActiveTurn<S: ByteStream> {
    id: TurnId,
    /// `None` when the request failed before a body was available.
    events: Option<EventStream<S>>,
    /// Index of the assistant placeholder in the transcript.
    placeholder: usize,
    chart_seen: bool,
}

pub struct ConversationController<T: ChatTransport, R: ChartRenderer> {
    transport: T,
    renderer: R,
    bus: Arc<EventBus>,
    session_id: Option<SessionId>,
    messages: Vec<ChatMessage>,
    is_loading: bool,
    current_error: Option<String>,
    current_chart: Option<Value>,
    is_chart_collapsed: bool,
    upload_progress: Option<u8>,
    upload_error: Option<String>,
    uploaded_documents: Vec<String>,
    active: Option<ActiveTurn<T::Stream>>,
    last_turn: Option<TurnId>,
    turn_state: TurnState,
}

impl<T: ChatTransport, R: ChartRenderer> ConversationController<T, R> {
    pub fn new(transport: T, renderer: R, bus: Arc<EventBus>) -> Self {
        Self {
            transport,
            renderer,
            bus,
            session_id: None,
            messages: Vec::new(),
            is_loading: false,
            current_error: None,
            current_chart: None,
            is_chart_collapsed: false,
            upload_progress: None,
            upload_error: None,
            uploaded_documents: Vec::new(),
            active: None,
            last_turn: None,
            turn_state: TurnState::Idle,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn current_error(&self) -> Option<&str> {
        self.current_error.as_deref()
    }

    /// Raw payload of the chart currently shown.
    pub fn current_chart(&self) -> Option<&Value> {
        self.current_chart.as_ref()
    }

    pub fn is_chart_collapsed(&self) -> bool {
        self.is_chart_collapsed
    }

    pub fn upload_progress(&self) -> Option<u8> {
        self.upload_progress
    }

    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub fn uploaded_documents(&self) -> &[String] {
        &self.uploaded_documents
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.turn_state
    }

    pub fn last_turn(&self) -> Option<&TurnId> {
        self.last_turn.as_ref()
    }

    /// True while a send has a stream left to pump.
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Replace the current session with a fresh one.
    ///
    /// Clearing the old session is best effort. On failure the surfaced error
    /// is set and the error is also returned.
    pub fn start_new_chat(&mut self) -> Result<(), TransportError> {
        self.cancel_turn();
        self.set_loading(true);
        self.set_error(None);
        self.close_chart();
        self.set_upload_progress(None);
        self.upload_error = None;
        self.uploaded_documents.clear();

        if let Some(previous) = self.session_id.take() {
            match self.transport.clear_session(&previous) {
                Ok(()) => log::info!("Session {} cleared", previous),
                Err(e) => log::warn!("Error clearing previous session {}: {}", previous, e),
            }
        }

        match self.transport.start_session() {
            Ok(session_id) => {
                log::info!("New session started: {}", session_id);
                self.session_id = Some(session_id.clone());
                self.publish(ConversationUpdate::SessionStarted { session_id });
                self.reset_messages(vec![ChatMessage::system(SESSION_STARTED)]);
                self.set_loading(false);
                Ok(())
            }
            Err(e) => {
                log::error!("Error starting new session: {}", e);
                self.set_error(Some(SESSION_FAILED.to_string()));
                self.set_loading(false);
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Start a turn for `text`.
    ///
    /// Any stream still in flight is cancelled first; none of its remaining
    /// events reach the transcript. Call [`pump`](Self::pump) or
    /// [`run_until_idle`](Self::run_until_idle) to consume the answer.
    ///
    /// The text is sent as typed; trimming only decides whether it is blank.
    pub fn send_message(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let Some(session_id) = self.session_id.clone() else {
            log::warn!("{}", NO_SESSION_FOR_SEND);
            self.set_error(Some(NO_SESSION_FOR_SEND.to_string()));
            return;
        };

        self.cancel_turn();
        self.push_message(ChatMessage::user(text));
        let placeholder = self.push_message(ChatMessage::placeholder());
        self.set_error(None);
        self.set_loading(true);

        let id = TurnId::new();
        self.set_turn_state(&id, TurnState::Sending);
        let result = self.transport.send_message(&session_id, text);
        self.active = Some(ActiveTurn {
            id: id.clone(),
            events: None,
            placeholder,
            chart_seen: false,
        });

        match result {
            Ok(source) => {
                if let Some(turn) = self.active.as_mut() {
                    turn.events = Some(EventStream::new(source));
                }
                self.set_turn_state(&id, TurnState::Streaming);
            }
            Err(e) => {
                log::error!("Failed to open message stream: {}", e);
                self.apply(StreamEvent::Error(e.to_event_payload()));
            }
        }
    }

    /// Process at most one event from the active stream.
    ///
    /// Returns `false` once there is nothing left to process.
    pub fn pump(&mut self) -> bool {
        let Some(turn) = self.active.as_mut() else {
            return false;
        };
        match turn.events.as_mut().and_then(Iterator::next) {
            Some(event) => {
                self.apply(event);
                true
            }
            None => {
                // Sequence ended without a terminal event reaching us.
                self.finish_turn(TurnState::Complete);
                false
            }
        }
    }

    /// Pump until the active turn reaches a terminal state.
    pub fn run_until_idle(&mut self) {
        while self.pump() {}
    }

    fn apply(&mut self, event: StreamEvent) {
        let Some(placeholder) = self.active.as_ref().map(|t| t.placeholder) else {
            return;
        };

        match event {
            StreamEvent::Token(token) => {
                if let Some(message) = self.messages.get_mut(placeholder) {
                    message.text.push_str(&token);
                    self.publish(ConversationUpdate::TokenAppended {
                        index: placeholder,
                        token,
                    });
                }
            }
            StreamEvent::Chart(payload) => {
                if let Some(turn) = self.active.as_mut() {
                    turn.chart_seen = true;
                }
                self.show_chart(payload);
            }
            StreamEvent::Complete(payload) => {
                log::info!("Stream complete: {}", payload);
                self.set_loading(false);
                self.finish_turn(TurnState::Complete);
            }
            StreamEvent::Error(payload) => {
                let message = error_text(&payload);
                log::error!("{}", StreamError::Rejected(payload));
                let text = format!("Error: {message}");
                if let Some(bubble) = self.messages.get_mut(placeholder) {
                    bubble.text = text.clone();
                    self.publish(ConversationUpdate::MessageUpdated {
                        index: placeholder,
                        text,
                    });
                }
                self.set_error(Some(message.clone()));
                self.set_loading(false);
                self.finish_turn(TurnState::Error { message });
            }
        }
    }

    /// End the active turn. Drops its stream, which releases the connection.
    fn finish_turn(&mut self, state: TurnState) {
        let Some(turn) = self.active.take() else {
            return;
        };
        let blank = self
            .messages
            .get(turn.placeholder)
            .is_some_and(ChatMessage::is_blank);
        if blank && !turn.chart_seen {
            self.remove_message(turn.placeholder);
        }
        self.set_loading(false);
        self.set_turn_state(&turn.id, state);
    }

    /// Abandon the active turn without a terminal transition.
    fn cancel_turn(&mut self) {
        let Some(mut turn) = self.active.take() else {
            return;
        };
        log::debug!("Cancelling in-flight turn {}", turn.id);
        if let Some(events) = turn.events.as_mut() {
            events.cancel();
        }
        let blank = self
            .messages
            .get(turn.placeholder)
            .is_some_and(ChatMessage::is_blank);
        if blank && !turn.chart_seen && turn.placeholder + 1 == self.messages.len() {
            self.remove_message(turn.placeholder);
        }
        self.set_loading(false);
        self.set_turn_state(&turn.id, TurnState::Idle);
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    /// Upload a document into the current session, blocking until it finishes.
    pub fn upload_document(&mut self, path: &Path) -> Result<UploadResponse, UploadError> {
        let Some(session_id) = self.session_id.clone() else {
            let err = UploadError::NoSession;
            log::warn!("{}", err);
            self.set_error(Some(err.to_string()));
            self.push_message(ChatMessage::error(err.to_string()));
            return Err(err);
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.upload_error = None;
        self.set_error(None);
        self.set_upload_progress(Some(0));
        self.set_loading(true);
        self.push_message(ChatMessage::system(format!("Uploading {name}...")));

        let mut outcome = None;
        for item in self.transport.upload_document(&session_id, path) {
            match item {
                Ok(event @ UploadEvent::Progress { .. }) => {
                    if let Some(percent) = event.percent() {
                        self.set_upload_progress(Some(percent));
                    }
                }
                Ok(UploadEvent::Completed { response }) => {
                    outcome = Some(Ok(response));
                    break;
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    break;
                }
            }
        }
        let outcome = outcome.unwrap_or_else(|| {
            Err(UploadError::InvalidResponse(
                "upload ended without a response".to_string(),
            ))
        });

        self.set_upload_progress(None);
        self.set_loading(false);
        match outcome {
            Ok(response) => {
                log::info!("Uploaded {} to session {}", name, session_id);
                self.push_message(ChatMessage::system(format!(
                    "{name} uploaded successfully. Ready to chat."
                )));
                self.uploaded_documents.push(name);
                Ok(response)
            }
            Err(e) => {
                log::error!("Upload of {} failed: {}", name, e);
                let message = e.to_string();
                self.upload_error = Some(message.clone());
                self.push_message(ChatMessage::error(format!(
                    "Failed to upload {name}: {message}"
                )));
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Chart panel
    // ------------------------------------------------------------------

    fn show_chart(&mut self, payload: Value) {
        let config = ChartConfig::from_payload(&payload);
        self.renderer.render(&config);
        self.current_chart = Some(payload);
        self.publish(ConversationUpdate::Chart { config });
    }

    pub fn close_chart(&mut self) {
        let had_chart = self.current_chart.take().is_some();
        self.is_chart_collapsed = false;
        if had_chart {
            self.renderer.clear();
            self.publish(ConversationUpdate::ChartCleared);
        }
    }

    pub fn toggle_chart_collapse(&mut self) {
        self.is_chart_collapsed = !self.is_chart_collapsed;
        self.publish(ConversationUpdate::ChartCollapsed {
            collapsed: self.is_chart_collapsed,
        });
    }

    // ------------------------------------------------------------------
    // State helpers; each publishes its change
    // ------------------------------------------------------------------

    fn topic(&self) -> String {
        match &self.session_id {
            Some(id) => format!("{}:{}", UPDATE_TOPIC, id),
            None => UPDATE_TOPIC.to_string(),
        }
    }

    fn publish(&self, update: ConversationUpdate) {
        self.bus.emit(&self.topic(), &update);
    }

    fn push_message(&mut self, message: ChatMessage) -> usize {
        let index = self.messages.len();
        self.messages.push(message.clone());
        self.publish(ConversationUpdate::MessageAppended { index, message });
        index
    }

    fn remove_message(&mut self, index: usize) {
        if index < self.messages.len() {
            self.messages.remove(index);
            self.publish(ConversationUpdate::MessageRemoved { index });
        }
    }

    fn reset_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.publish(ConversationUpdate::MessagesReset {
            messages: self.messages.clone(),
        });
    }

    fn set_loading(&mut self, loading: bool) {
        if self.is_loading != loading {
            self.is_loading = loading;
            self.publish(ConversationUpdate::Loading { loading });
        }
    }

    fn set_error(&mut self, message: Option<String>) {
        if self.current_error != message {
            self.current_error = message.clone();
            self.publish(ConversationUpdate::Error { message });
        }
    }

    fn set_upload_progress(&mut self, percent: Option<u8>) {
        if self.upload_progress != percent {
            self.upload_progress = percent;
            self.publish(ConversationUpdate::UploadProgress { percent });
        }
    }

    fn set_turn_state(&mut self, id: &TurnId, state: TurnState) {
        self.last_turn = Some(id.clone());
        self.turn_state = state.clone();
        self.publish(ConversationUpdate::Turn {
            turn_id: id.clone(),
            state,
        });
    }
}

impl<T: ChatTransport, R: ChartRenderer> Drop for ConversationController<T, R> {
    fn drop(&mut self) {
        if let Some(mut turn) = self.active.take() {
            log::debug!("Controller dropped with turn {} in flight", turn.id);
            if let Some(events) = turn.events.as_mut() {
                events.cancel();
            }
        }
    }
}
