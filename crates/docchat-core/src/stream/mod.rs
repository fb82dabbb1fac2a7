//! Response stream decoding.
//!
//! The chat endpoint answers with a body of frames:
//!
//! ```text
//! event: <type>
//! data: <json>
//!
//! ```
//!
//! [`StreamDecoder`] turns bytes into [`StreamEvent`]s; [`EventStream`] pairs a
//! decoder with a [`ByteStream`] source to give a cancellable, lazy sequence
//! of events that always ends with exactly one terminal event.

mod decoder;
mod event;
mod frame;
mod utf8;

pub use decoder::StreamDecoder;
pub use event::{read_failure_payload, StreamEvent};
pub use frame::{Frame, DEFAULT_EVENT};
pub use utf8::Utf8Decoder;

use std::collections::VecDeque;
use std::io;

use crate::error::StreamError;

/// A source of raw body chunks.
pub trait ByteStream {
    /// Block until the next chunk arrives. `None` means end of input.
    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>>;

    /// Stop reading and release the underlying connection.
    fn cancel(&mut self);
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        (**self).next_chunk()
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }
}

/// An in-memory byte source, e.g. a captured response body being replayed.
#[derive(Debug, Default)]
pub struct MemoryStream {
    chunks: VecDeque<io::Result<Vec<u8>>>,
    cancelled: bool,
}

impl MemoryStream {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| Ok(c.into())).collect(),
            cancelled: false,
        }
    }

    /// Queue a read failure after the chunks already queued.
    pub fn then_fail(mut self, kind: io::ErrorKind, message: &str) -> Self {
        self.chunks.push_back(Err(io::Error::new(kind, message.to_string())));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

impl ByteStream for MemoryStream {
    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        if self.cancelled {
            return None;
        }
        self.chunks.pop_front()
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.chunks.clear();
    }
}

/// Lazy sequence of [`StreamEvent`]s read from a [`ByteStream`].
///
/// Events come out in decode order and the last one is always terminal.
/// After a terminal event, or after [`EventStream::cancel`], the iterator
/// yields nothing more. The source is cancelled as soon as it is no longer
/// needed, and when the stream is dropped.
pub struct EventStream<S: ByteStream> {
    source: S,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
    cancelled: bool,
}

impl<S: ByteStream> EventStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            decoder: StreamDecoder::new(),
            pending: VecDeque::new(),
            cancelled: false,
        }
    }

    /// Abandon the stream. Undelivered events are discarded.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            log::debug!("Cancelling event stream");
        }
        self.cancelled = true;
        self.pending.clear();
        self.source.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Access the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: ByteStream> Iterator for EventStream<S> {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        loop {
            if self.cancelled {
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.decoder.is_terminated() {
                return None;
            }

            match self.source.next_chunk() {
                Some(Ok(chunk)) => {
                    self.pending.extend(self.decoder.feed(&chunk));
                    if self.decoder.is_terminated() {
                        self.source.cancel();
                    }
                }
                Some(Err(err)) => {
                    let err = StreamError::from(err);
                    log::error!("{}", err);
                    let payload = read_failure_payload(&err);
                    self.pending.extend(self.decoder.fail(payload));
                    self.source.cancel();
                }
                None => {
                    log::debug!("Stream ended");
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }
}

impl<S: ByteStream> Drop for EventStream<S> {
    fn drop(&mut self) {
        self.source.cancel();
    }
}
