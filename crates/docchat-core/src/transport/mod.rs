//! HTTP transport for the chat backend.
//!
//! | Operation | Endpoint |
//! |---|---|
//! | start session | `POST {base}/new` → `{"sessionId": …}` |
//! | clear session | `DELETE {base}/{id}` |
//! | upload | `POST {base}/{id}/upload` (multipart, field `file`) |
//! | send message | `POST {base}/{id}/message` with `{"message": …}` → frame stream |
//!
//! [`ChatTransport`] is the seam between the conversation controller and the
//! network; [`ApiClient`] is the ureq-backed implementation.

mod client;
mod http_stream;
mod upload;

pub use client::ApiClient;
pub use http_stream::HttpByteStream;
pub use upload::{MultipartForm, Upload, UploadEvent, UploadResponse};

use std::path::Path;

use crate::error::TransportError;
use crate::session::SessionId;
use crate::stream::ByteStream;

/// Operations the conversation controller needs from the backend.
pub trait ChatTransport {
    type Stream: ByteStream;

    /// Open a new session.
    fn start_session(&self) -> Result<SessionId, TransportError>;

    /// Invalidate a session on the server.
    fn clear_session(&self, session_id: &SessionId) -> Result<(), TransportError>;

    /// Upload a document. Progress and the outcome arrive through the
    /// returned sequence.
    fn upload_document(&self, session_id: &SessionId, path: &Path) -> Upload;

    /// Post a message and return the response body as a byte stream.
    fn send_message(
        &self,
        session_id: &SessionId,
        message: &str,
    ) -> Result<Self::Stream, TransportError>;
}
