//! ureq-backed API client.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{TransportError, UploadError};
use crate::logging::{log_line, open_log_file, LogHandle};
use crate::session::{SessionId, SessionResponse};

use super::http_stream::HttpByteStream;
use super::upload::{spawn_upload, Upload};
use super::ChatTransport;

/// Blocking HTTP client for the chat API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .user_agent(&config.user_agent);
        if let Some(timeout) = config.read_timeout {
            builder = builder.timeout_read(timeout);
        }
        Self {
            agent: builder.build(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn session_log(&self, session_id: &SessionId) -> LogHandle {
        open_log_file(self.config.log_dir.as_deref(), session_id.as_str())
    }
}

impl ChatTransport for ApiClient {
    type Stream = HttpByteStream;

    fn start_session(&self) -> Result<SessionId, TransportError> {
        let url = self.config.endpoint("new");
        log::debug!("POST {}", url);

        let response = self.agent.post(&url).send_json(serde_json::json!({}))?;
        let body: SessionResponse = response
            .into_json()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        log::info!("New session ID: {}", body.session_id);
        log_line(&self.session_log(&body.session_id), "SESSION", "started");
        Ok(body.session_id)
    }

    fn clear_session(&self, session_id: &SessionId) -> Result<(), TransportError> {
        let url = self.config.endpoint(session_id.as_str());
        log::debug!("DELETE {}", url);

        self.agent.delete(&url).call()?;
        log_line(&self.session_log(session_id), "SESSION", "cleared");
        Ok(())
    }

    fn upload_document(&self, session_id: &SessionId, path: &Path) -> Upload {
        if session_id.as_str().is_empty() {
            return Upload::failed(UploadError::NoSession);
        }
        let url = self.config.endpoint(&format!("{}/upload", session_id));
        spawn_upload(self.agent.clone(), url, path, self.session_log(session_id))
    }

    fn send_message(
        &self,
        session_id: &SessionId,
        message: &str,
    ) -> Result<HttpByteStream, TransportError> {
        let url = self.config.endpoint(&format!("{}/message", session_id));
        let body = serde_json::json!({ "message": message });
        let log = self.session_log(session_id);
        log::debug!("POST {}", url);
        log_line(&log, "SEND", &body.to_string());

        let response = self
            .agent
            .post(&url)
            .set("Accept", "text/event-stream")
            .send_json(body)
            .map_err(|err| {
                let err = TransportError::from(err);
                log_line(&log, "ERROR", &err.to_string());
                err
            })?;

        Ok(HttpByteStream::new(response.into_reader(), log))
    }
}
