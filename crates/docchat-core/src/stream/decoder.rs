//! Incremental response-stream decoder.
//!
//! Turns raw body bytes into [`StreamEvent`]s.
//!
//! # How This Decoder Works
//!
//! 1. Bytes are decoded to text with [`Utf8Decoder`], so a character split
//!    across two chunks is held back until it is complete.
//! 2. Text is appended to an owned buffer. A scan position remembers how far
//!    the buffer has already been searched for a `\n\n` boundary, so bytes are
//!    never rescanned (except one trailing `\n` that may start a boundary).
//! 3. Every complete frame is parsed and promoted to an event. Consumed text
//!    is drained from the buffer once per chunk.
//! 4. A terminal event (`complete` or `error`) ends decoding for good: the
//!    rest of the buffer is discarded and later input is ignored.
//!
//! At end of input [`StreamDecoder::finish`] parses whatever partial frame is
//! left and, if no terminal event was seen, synthesizes a completion so the
//! consumer always sees exactly one terminal event.

use serde_json::Value;

use super::event::StreamEvent;
use super::frame::Frame;
use super::utf8::Utf8Decoder;

const FRAME_BOUNDARY: &str = "\n\n";

#[derive(Debug, Default)]
pub struct StreamDecoder {
    utf8: Utf8Decoder,
    /// Text received but not yet consumed as a frame.
    buffer: String,
    /// Byte offset in `buffer` where the next boundary search starts.
    scan_from: usize,
    terminated: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed a chunk of body bytes and collect the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        let text = self.utf8.decode(chunk);
        self.buffer.push_str(&text);
        self.drain_frames()
    }

    /// Signal end of input.
    ///
    /// Parses the leftover partial frame (best effort) and appends a
    /// synthesized completion unless a terminal event was already emitted.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }

        let tail = self.utf8.flush();
        self.buffer.push_str(&tail);
        let mut events = self.drain_frames();
        if self.terminated {
            return events;
        }

        let remainder = std::mem::take(&mut self.buffer);
        if !remainder.trim().is_empty() {
            log::debug!("Flushing partial frame at end of stream: {:?}", remainder);
            if let Some(event) = Frame::parse(&remainder).into_event() {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    self.terminate();
                    return events;
                }
            }
        }

        events.push(StreamEvent::finished_without_terminal());
        self.terminate();
        events
    }

    /// Terminate with an error event carrying `payload`.
    ///
    /// Used for read failures mid-stream and for requests that never got a
    /// stream. Does nothing if the stream already terminated.
    pub fn fail(&mut self, payload: Value) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        self.terminate();
        vec![StreamEvent::Error(payload)]
    }

    fn drain_frames(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[self.scan_from..].find(FRAME_BOUNDARY) {
            let end = self.scan_from + offset;
            let frame = Frame::parse(&self.buffer[consumed..end]);
            consumed = end + FRAME_BOUNDARY.len();
            self.scan_from = consumed;

            if let Some(event) = frame.into_event() {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    self.terminate();
                    return events;
                }
            }
        }

        self.buffer.drain(..consumed);
        // A trailing '\n' may be the first half of the next boundary.
        self.scan_from = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        events
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.buffer.clear();
        self.scan_from = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_all(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.feed(chunk));
        }
        events.extend(decoder.finish());
        events
    }

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token(text.to_string())
    }

    fn token_frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({"type": "token", "data": text})
        )
    }

    mod framing {
        use super::*;

        #[test]
        fn chart_then_complete() {
            let input = "event: chart\ndata: {\"chartType\":\"bar\"}\n\nevent: complete\ndata: {}\n\n";
            let events = decode_all(&[input.as_bytes()]);
            assert_eq!(
                events,
                vec![
                    StreamEvent::Chart(json!({"chartType": "bar"})),
                    StreamEvent::Complete(json!({})),
                ]
            );
        }

        #[test]
        fn event_name_split_across_chunks() {
            let events = decode_all(&[
                b"event: tok",
                b"en\ndata: {\"type\":\"token\",\"data\":\"hi\"}\n\n",
            ]);
            assert_eq!(events[0], token("hi"));
            assert_eq!(events.len(), 2);
            assert!(events[1].is_terminal());
        }

        #[test]
        fn multiple_frames_in_one_chunk() {
            let input = format!("{}{}{}", token_frame("a"), token_frame("b"), token_frame("c"));
            let mut decoder = StreamDecoder::new();
            let events = decoder.feed(input.as_bytes());
            assert_eq!(events, vec![token("a"), token("b"), token("c")]);
            assert!(!decoder.is_terminated());
        }

        #[test]
        fn boundary_split_between_chunks() {
            let mut decoder = StreamDecoder::new();
            assert!(decoder.feed(b"data: {\"type\":\"token\",\"data\":\"x\"}\n").is_empty());
            assert_eq!(decoder.feed(b"\n"), vec![token("x")]);
        }

        #[test]
        fn frame_waits_for_boundary() {
            let mut decoder = StreamDecoder::new();
            assert!(decoder.feed(b"data: {\"type\":\"token\",").is_empty());
            assert!(decoder.feed(b"\"data\":\"late\"}").is_empty());
            assert_eq!(decoder.feed(b"\n\n"), vec![token("late")]);
        }

        #[test]
        fn multibyte_character_split_inside_data() {
            let input = token_frame("héllo 🦀");
            let bytes = input.as_bytes();
            let crab = input.find('🦀').unwrap();
            let events = decode_all(&[&bytes[..crab + 2], &bytes[crab + 2..]]);
            assert_eq!(events[0], token("héllo 🦀"));
        }

        #[test]
        fn every_fragmentation_matches_unfragmented() {
            let input = format!(
                "{}event: chart\ndata: {}\n\n{}event: complete\ndata: {{\"ok\":true}}\n\n",
                token_frame("Grüße "),
                json!({"chartType": "line", "labels": ["ä", "ß"]}),
                token_frame("→ done"),
            );
            let bytes = input.as_bytes();
            let expected = decode_all(&[bytes]);
            assert_eq!(expected.len(), 4);

            for split in 0..=bytes.len() {
                let events = decode_all(&[&bytes[..split], &bytes[split..]]);
                assert_eq!(events, expected, "split at byte {}", split);
            }

            for size in 1..8 {
                let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
                assert_eq!(decode_all(&chunks), expected, "chunk size {}", size);
            }
        }
    }

    mod termination {
        use super::*;

        #[test]
        fn nothing_after_complete() {
            let input = format!(
                "event: complete\ndata: {{}}\n\n{}",
                token_frame("ignored")
            );
            let mut decoder = StreamDecoder::new();
            let events = decoder.feed(input.as_bytes());
            assert_eq!(events, vec![StreamEvent::Complete(json!({}))]);
            assert!(decoder.is_terminated());
            assert!(decoder.feed(token_frame("later").as_bytes()).is_empty());
            assert!(decoder.finish().is_empty());
        }

        #[test]
        fn nothing_after_error() {
            let mut decoder = StreamDecoder::new();
            let events = decoder.feed(b"event: error\ndata: {\"message\":\"boom\"}\n\n");
            assert_eq!(events, vec![StreamEvent::Error(json!({"message": "boom"}))]);
            assert!(decoder.feed(b"event: complete\ndata: {}\n\n").is_empty());
            assert!(decoder.finish().is_empty());
            assert!(decoder.fail(json!({})).is_empty());
        }

        #[test]
        fn end_of_input_synthesizes_one_completion() {
            let events = decode_all(&[token_frame("only").as_bytes()]);
            assert_eq!(
                events,
                vec![token("only"), StreamEvent::finished_without_terminal()]
            );
        }

        #[test]
        fn empty_stream_still_completes() {
            let events = decode_all(&[]);
            assert_eq!(events, vec![StreamEvent::finished_without_terminal()]);
        }

        #[test]
        fn finish_twice_emits_once() {
            let mut decoder = StreamDecoder::new();
            assert_eq!(decoder.finish().len(), 1);
            assert!(decoder.finish().is_empty());
        }

        #[test]
        fn partial_frame_is_flushed_at_end() {
            let events = decode_all(&[b"data: {\"type\":\"token\",\"data\":\"tail\"}"]);
            assert_eq!(
                events,
                vec![token("tail"), StreamEvent::finished_without_terminal()]
            );
        }

        #[test]
        fn partial_terminal_frame_at_end_is_not_doubled() {
            let events = decode_all(&[b"event: complete\ndata: {\"n\":1}\n"]);
            assert_eq!(events, vec![StreamEvent::Complete(json!({"n": 1}))]);
        }

        #[test]
        fn garbled_partial_typed_frame_is_dropped() {
            let events = decode_all(&[b"event: chart\ndata: {\"chartTy"]);
            assert_eq!(events, vec![StreamEvent::finished_without_terminal()]);
        }

        #[test]
        fn whitespace_remainder_is_ignored() {
            let input = format!("{}\n", token_frame("a"));
            let events = decode_all(&[input.as_bytes()]);
            assert_eq!(events, vec![token("a"), StreamEvent::finished_without_terminal()]);
        }

        #[test]
        fn fail_emits_single_error() {
            let mut decoder = StreamDecoder::new();
            assert_eq!(decoder.feed(token_frame("a").as_bytes()), vec![token("a")]);
            let events = decoder.fail(json!({"message": "Stream reading error."}));
            assert_eq!(
                events,
                vec![StreamEvent::Error(json!({"message": "Stream reading error."}))]
            );
            assert!(decoder.feed(token_frame("b").as_bytes()).is_empty());
            assert!(decoder.finish().is_empty());
        }
    }

    mod recovery {
        use super::*;

        #[test]
        fn malformed_default_frame_yields_raw_token() {
            let events = decode_all(&[b"data: not json at all\n\n"]);
            assert_eq!(events[0], token("not json at all"));
        }

        #[test]
        fn malformed_typed_frames_yield_nothing() {
            let input = b"event: chart\ndata: {bad\n\nevent: complete\ndata: {bad\n\nevent: error\ndata: {bad\n\n";
            let events = decode_all(&[input]);
            assert_eq!(events, vec![StreamEvent::finished_without_terminal()]);
        }

        #[test]
        fn decoding_continues_after_dropped_frame() {
            let input = format!("event: chart\ndata: oops\n\n{}", token_frame("still here"));
            let events = decode_all(&[input.as_bytes()]);
            assert_eq!(events[0], token("still here"));
        }

        #[test]
        fn duplicate_data_lines_overwrite() {
            let events = decode_all(&[
                b"data: {\"type\":\"token\",\"data\":\"old\"}\ndata: {\"type\":\"token\",\"data\":\"new\"}\n\n",
            ]);
            assert_eq!(events[0], token("new"));
        }
    }
}
