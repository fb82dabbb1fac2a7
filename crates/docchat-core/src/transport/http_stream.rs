//! Streaming response body.

use std::io::{self, Read};

use crate::logging::{log_line, LogHandle};
use crate::stream::ByteStream;

const READ_CHUNK: usize = 8 * 1024;

/// A response body read chunk by chunk on the caller's thread.
///
/// Cancelling drops the body reader, which closes the connection instead of
/// returning it to the pool.
pub struct HttpByteStream {
    reader: Option<Box<dyn Read + Send>>,
    log: LogHandle,
}

impl HttpByteStream {
    pub fn new(reader: impl Read + Send + 'static, log: LogHandle) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            log,
        }
    }

    /// Whether the body is still open.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

impl ByteStream for HttpByteStream {
    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        let reader = self.reader.as_mut()?;
        let mut buf = vec![0u8; READ_CHUNK];
        let result = loop {
            match reader.read(&mut buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(0) => {
                log_line(&self.log, "EOF", "");
                self.reader = None;
                None
            }
            Ok(n) => {
                buf.truncate(n);
                log_line(&self.log, "RECV", &String::from_utf8_lossy(&buf));
                Some(Ok(buf))
            }
            Err(err) => {
                log_line(&self.log, "ERROR", &err.to_string());
                self.reader = None;
                Some(Err(err))
            }
        }
    }

    fn cancel(&mut self) {
        if self.reader.take().is_some() {
            log::debug!("Closing response stream");
            log_line(&self.log, "CANCEL", "");
        }
    }
}

impl Drop for HttpByteStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
