//! Per-session wire log.
//!
//! When a log directory is configured, requests, raw response chunks and
//! stream lifecycle markers are appended to `{log_dir}/{session_id}.log`.
//! This is separate from the `log` facade output, which stays terse.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// A handle that writes nowhere.
pub fn disabled() -> LogHandle {
    Arc::new(Mutex::new(None))
}

/// Current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), direction, data);
            let _ = file.flush();
        }
    }
}

/// Open (or create) a log file at `{log_dir}/{log_id}.log` and return a shared handle.
///
/// Failures are logged and yield a disabled handle; wire logging never
/// blocks a request.
pub fn open_log_file(log_dir: Option<&str>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        let path = Path::new(dir).join(format!("{}.log", sanitize(log_id)));
        if let Err(err) = std::fs::create_dir_all(dir) {
            log::warn!("Cannot create log directory {}: {}", dir, err);
            return None;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| log::warn!("Cannot open wire log {}: {}", path.display(), err))
            .ok()
    });
    Arc::new(Mutex::new(file))
}

/// Session ids come from the server; keep them from escaping the log dir.
fn sanitize(log_id: &str) -> String {
    let cleaned: String = log_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned
    }
}
