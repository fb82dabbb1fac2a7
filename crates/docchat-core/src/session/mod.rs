//! Chat sessions issued by the backend.
//!
//! The client holds at most one active session; it is created by
//! `POST /new`, invalidated by `DELETE /{id}`, and replaced whenever a new
//! chat is started.

mod state;

pub use state::{SessionId, SessionResponse};
