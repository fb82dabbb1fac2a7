//! Error types for the chat client.
//!
//! Failures are scoped to a single session or a single send; nothing here is
//! fatal to the process.

use thiserror::Error;

/// Failures establishing a request, before any streaming begins.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error! status: {status}")]
    Status {
        status: u16,
        /// JSON error body returned by the backend, if it sent one.
        body: Option<serde_json::Value>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Payload used when this failure is surfaced as a terminal `error` event.
    pub fn to_event_payload(&self) -> serde_json::Value {
        match self {
            TransportError::Status {
                body: Some(body), ..
            } if !body.is_null() => body.clone(),
            TransportError::Status { status, .. } => {
                serde_json::json!({ "message": format!("HTTP error! status: {status}") })
            }
            TransportError::Network(detail) => serde_json::json!({
                "message": "Failed to connect to stream.",
                "detail": detail,
            }),
            TransportError::InvalidResponse(detail) => serde_json::json!({
                "message": "Failed to connect to stream.",
                "detail": detail,
            }),
        }
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_json::<serde_json::Value>().ok();
                TransportError::Status { status, body }
            }
            ureq::Error::Transport(transport) => TransportError::Network(transport.to_string()),
        }
    }
}

/// Failures uploading a document.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Cannot upload file: No active session. Try 'New Chat'.")]
    NoSession,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ureq::Error> for UploadError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let message = response
                    .into_json::<serde_json::Value>()
                    .ok()
                    .and_then(|body| {
                        body.get("error")
                            .and_then(|e| e.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| format!("HTTP error! status: {status}"));
                UploadError::Status { status, message }
            }
            ureq::Error::Transport(transport) => UploadError::Network(transport.to_string()),
        }
    }
}

/// Failures surfaced while a response stream is being read.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream reading error: {0}")]
    Read(#[from] std::io::Error),

    /// The backend sent an explicit `error` frame.
    #[error("Stream rejected: {0}")]
    Rejected(serde_json::Value),
}

/// Malformed frame content. Recovered locally and only ever logged.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid JSON in '{event}' frame: {source} (raw: {raw})")]
    InvalidJson {
        event: String,
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}
