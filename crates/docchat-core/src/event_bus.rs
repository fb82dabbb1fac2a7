//! Framework-agnostic update broadcasting.
//!
//! The conversation controller publishes every state change here; front ends
//! (terminal, web view, desktop shell) subscribe and redraw.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::event_bus::EventBus;
//! use std::sync::Arc;
//!
//! let event_bus = Arc::new(EventBus::new());
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.emit("chat:update:abc123", &serde_json::json!({"kind": "loading", "loading": true}));
//!
//! let event = rx.try_recv().unwrap();
//! assert_eq!(event.event_type, "chat:update:abc123");
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity for the event bus.
/// Events beyond this capacity will cause slow subscribers to miss events (lag).
const DEFAULT_CAPACITY: usize = 1024;

/// A broadcast event containing an event type and JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEvent {
    /// Event type identifier (e.g., "chat:update:abc123").
    pub event_type: String,

    /// JSON payload for the event.
    pub payload: serde_json::Value,
}

impl BroadcastEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Publish-subscribe bus backed by a tokio broadcast channel.
///
/// Sending never blocks and needs no runtime, so the single-threaded
/// controller can publish from inside its event loop.
pub struct EventBus {
    sender: broadcast::Sender<BroadcastEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event; with no
    /// subscribers the event is dropped and 0 is returned.
    pub fn emit<T: Serialize>(&self, event_type: &str, payload: &T) -> usize {
        let json_payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Failed to serialize event payload: {}", e);
                return 0;
            }
        };

        self.sender
            .send(BroadcastEvent::new(event_type, json_payload))
            .unwrap_or(0)
    }

    /// Subscribe to all future events on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emit_returns_zero_with_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.emit("chat:update", &json!({})), 0);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn events_arrive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit("chat:update:s", &json!({"n": 1}));
        bus.emit("chat:update:s", &json!({"n": 2}));

        assert_eq!(rx.try_recv().unwrap().payload["n"], 1);
        assert_eq!(rx.try_recv().unwrap().payload["n"], 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn every_subscriber_gets_a_copy() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.emit("chat:update", &"hello"), 2);
        assert_eq!(rx1.try_recv().unwrap().payload, json!("hello"));
        assert_eq!(rx2.try_recv().unwrap().payload, json!("hello"));
    }

    #[tokio::test]
    async fn async_subscriber_receives() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit("chat:update:s", &json!({"kind": "loading", "loading": false}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "chat:update:s");
        assert_eq!(event.payload["loading"], false);
    }

    #[test]
    fn slow_subscriber_lags() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for n in 0..3 {
            bus.emit("e", &json!({"n": n}));
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
    }
}
