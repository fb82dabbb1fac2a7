//! # docchat-core
//!
//! Core client logic for DocChat, a chat front end for a document-analysis
//! assistant.
//!
//! This crate is framework-agnostic and can be used by:
//! - the `docchat` terminal client
//! - any GUI shell that subscribes to the [`event_bus::EventBus`]
//!
//! ## Key Concepts
//!
//! - **Session**: a server-issued conversation that documents are uploaded into
//! - **Frame**: one `event:`/`data:` block of the streamed answer
//! - **StreamEvent**: a decoded token, chart, completion or error
//! - **Turn**: one user message and the streamed answer to it

pub mod chart;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event_bus;
pub mod logging;
pub mod session;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use chart::{ChartConfig, ChartRenderer};
pub use config::ClientConfig;
pub use conversation::{ChatMessage, ConversationController, ConversationUpdate, Role};
pub use error::{TransportError, UploadError};
pub use session::SessionId;
pub use stream::{EventStream, StreamDecoder, StreamEvent};
pub use transport::{ApiClient, ChatTransport};
