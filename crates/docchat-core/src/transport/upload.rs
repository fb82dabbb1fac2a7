//! Document upload with progress reporting.
//!
//! The request body is a `multipart/form-data` form with a single `file`
//! field. It is streamed through [`ProgressReader`], which reports how many
//! bytes ureq has pulled so far. The request runs on a worker thread so the
//! caller can consume progress while the body is being sent.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::logging::{log_line, LogHandle};

/// Body of a successful upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Any other fields the backend includes.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Progress of an upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UploadEvent {
    /// Bytes of the request body sent so far.
    Progress { loaded: u64, total: Option<u64> },
    /// The server accepted the document.
    Completed { response: UploadResponse },
}

impl UploadEvent {
    /// Whole-number percentage, when the total size is known.
    pub fn percent(&self) -> Option<u8> {
        match self {
            UploadEvent::Progress {
                loaded,
                total: Some(total),
            } if *total > 0 => {
                let pct = (100.0 * *loaded as f64 / *total as f64).round();
                Some(pct.clamp(0.0, 100.0) as u8)
            }
            _ => None,
        }
    }
}

type UploadItem = Result<UploadEvent, UploadError>;

/// Lazy sequence of upload events.
///
/// Yields any number of `Progress` events followed by exactly one terminal
/// item: `Ok(Completed)` or `Err(UploadError)`.
pub struct Upload {
    receiver: Option<Receiver<UploadItem>>,
}

impl Upload {
    fn new(receiver: Receiver<UploadItem>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    /// Build an upload from already-known items.
    pub fn from_events(items: impl IntoIterator<Item = UploadItem>) -> Self {
        let (tx, rx) = mpsc::channel();
        for item in items {
            let _ = tx.send(item);
        }
        Self::new(rx)
    }

    /// An upload that fails immediately without touching the network.
    pub fn failed(err: UploadError) -> Self {
        Self::from_events([Err(err)])
    }
}

impl Iterator for Upload {
    type Item = UploadItem;

    fn next(&mut self) -> Option<UploadItem> {
        let receiver = self.receiver.as_ref()?;
        let item = match receiver.recv() {
            Ok(item) => item,
            Err(_) => Err(UploadError::InvalidResponse(
                "upload ended without a response".to_string(),
            )),
        };
        if !matches!(item, Ok(UploadEvent::Progress { .. })) {
            self.receiver = None;
        }
        Some(item)
    }
}

/// A `multipart/form-data` body with one file part.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn file(field: &str, file_name: &str, content_type: &str, contents: &[u8]) -> Self {
        let boundary = generate_boundary();
        let mut body = Vec::with_capacity(contents.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(field),
                escape_quoted(file_name)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Self { boundary, body }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn len(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

fn generate_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("----docchat{suffix}")
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Reader that reports cumulative progress as it is drained.
struct ProgressReader<R> {
    inner: R,
    loaded: u64,
    total: u64,
    last_percent: Option<u64>,
    sender: Sender<UploadItem>,
}

impl<R: Read> ProgressReader<R> {
    fn new(inner: R, total: u64, sender: Sender<UploadItem>) -> Self {
        Self {
            inner,
            loaded: 0,
            total,
            last_percent: None,
            sender,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.loaded += n as u64;
            // One event per whole percent keeps large uploads from flooding the channel.
            let percent = self.loaded * 100 / self.total.max(1);
            if self.last_percent != Some(percent) {
                self.last_percent = Some(percent);
                let _ = self.sender.send(Ok(UploadEvent::Progress {
                    loaded: self.loaded,
                    total: Some(self.total),
                }));
            }
        }
        Ok(n)
    }
}

/// Start uploading `path` to `url` on a worker thread.
pub(crate) fn spawn_upload(agent: ureq::Agent, url: String, path: &Path, log: LogHandle) -> Upload {
    let (tx, rx) = mpsc::channel();
    let path = path.to_path_buf();
    thread::spawn(move || {
        let result = send_file(&agent, &url, &path, &tx, &log);
        match &result {
            Ok(_) => log_line(&log, "UPLOADED", &path.display().to_string()),
            Err(err) => {
                log::error!("Upload of {} failed: {}", path.display(), err);
                log_line(&log, "UPLOAD_ERROR", &err.to_string());
            }
        }
        let _ = tx.send(result.map(|response| UploadEvent::Completed { response }));
    });
    Upload::new(rx)
}

fn send_file(
    agent: &ureq::Agent,
    url: &str,
    path: &Path,
    tx: &Sender<UploadItem>,
    log: &LogHandle,
) -> Result<UploadResponse, UploadError> {
    let contents = std::fs::read(path).map_err(|source| UploadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let form = MultipartForm::file("file", file_name, mime.essence_str(), &contents);
    let total = form.len();
    let content_type = form.content_type();
    log::info!("Uploading {} ({} bytes) to {}", file_name, contents.len(), url);
    log_line(log, "UPLOAD", &format!("{} ({} bytes)", file_name, contents.len()));

    let _ = tx.send(Ok(UploadEvent::Progress {
        loaded: 0,
        total: Some(total),
    }));
    let reader = ProgressReader::new(Cursor::new(form.into_body()), total, tx.clone());
    let response = agent
        .post(url)
        .set("Content-Type", &content_type)
        .set("Content-Length", &total.to_string())
        .send(reader)?;

    response
        .into_json::<UploadResponse>()
        .map_err(|e| UploadError::InvalidResponse(e.to_string()))
}
