// Incremental text/event-stream decoding, following
// https://html.spec.whatwg.org/multipage/server-sent-events.html#event-stream-interpretation
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};

use super::{SseEvent, StreamFault};

const DEFAULT_EVENT_NAME: &str = "message";

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    event_name: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry: Option<Duration>,
    seen_first_line: bool,
}

impl SseDecoder {
    pub fn new() -> SseDecoder {
        SseDecoder::default()
    }

    /// Feeds one chunk of the response body, returning every event completed by it.
    /// Partial lines stay buffered until the next chunk arrives.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, StreamFault> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line) = self.next_line() {
            if let Some(event) = self.process_line(&line)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn next_line(&mut self) -> Option<Bytes> {
        let eol = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r')?;

        let terminator_len = if self.buffer[eol] == b'\r' {
            // A CR at the very end might still be the first half of a CRLF.
            if eol + 1 >= self.buffer.len() {
                return None;
            }
            if self.buffer[eol + 1] == b'\n' {
                2
            } else {
                1
            }
        } else {
            1
        };

        let line = self.buffer.split_to(eol).freeze();
        self.buffer.advance(terminator_len);
        Some(line)
    }

    fn process_line(&mut self, line: &[u8]) -> Result<Option<SseEvent>, StreamFault> {
        let line = std::str::from_utf8(line).map_err(|e| {
            StreamFault::Transport(format!("Event stream contained invalid UTF-8: {}", e))
        })?;

        let line = if !self.seen_first_line {
            self.seen_first_line = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        } else {
            line
        };

        if line.is_empty() {
            return Ok(self.dispatch());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event_name = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => (),
        }
        Ok(None)
    }

    // Blocks that only carry `retry:` are still surfaced so the connection can pick up
    // the new reconnection time; they have empty data and no listener binds to them.
    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_name = self.event_name.take();
        if !self.has_data && self.retry.is_none() {
            return None;
        }
        self.has_data = false;

        Some(SseEvent {
            event: event_name.unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
            retry: self.retry.take(),
        })
    }
}
