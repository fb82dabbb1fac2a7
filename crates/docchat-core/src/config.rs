//! Client configuration.

use std::time::Duration;

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/chat";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for talking to the chat backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the chat API, e.g. `http://host/api/chat` (no trailing slash).
    pub base_url: String,
    /// Directory for per-session wire logs. `None` disables wire logging.
    pub log_dir: Option<String>,
    /// How long to wait for a TCP connection.
    pub connect_timeout: Duration,
    /// Longest wait for a single read from a response body. `None` waits
    /// forever; a stalled answer then never ends.
    pub read_timeout: Option<Duration>,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            log_dir: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            user_agent: format!("docchat/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a config pointing at the given API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().base_url(base_url)
    }

    /// Build a config from `DOCCHAT_URL`, `DOCCHAT_LOG_DIR` and
    /// `DOCCHAT_READ_TIMEOUT` (seconds), falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("DOCCHAT_URL").filter(|v| !v.trim().is_empty()) {
            config = config.base_url(url);
        }
        if let Some(dir) = lookup("DOCCHAT_LOG_DIR").filter(|v| !v.trim().is_empty()) {
            config = config.log_dir(dir);
        }
        if let Some(raw) = lookup("DOCCHAT_READ_TIMEOUT").filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config = config.read_timeout(Duration::from_secs(secs)),
                _ => log::warn!("Ignoring invalid DOCCHAT_READ_TIMEOUT: {:?}", raw),
            }
        }
        config
    }

    /// Set the API root. A trailing slash is stripped.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Enable wire logging into `dir`.
    pub fn log_dir(mut self, dir: impl Into<String>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Fail body reads that stall for longer than `timeout`.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Join a path below the API root.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
