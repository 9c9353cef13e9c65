use serde_json::Value;

use crate::events::StreamEvent;

/// Incremental parser for SSE byte streams.
///
/// Network reads never align to event boundaries, so bytes accumulate in an
/// internal buffer and complete double-newline-delimited blocks are drained
/// as they form. The `[DONE]` sentinel latches the parser shut: anything
/// still buffered or fed afterwards is ignored.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: String,
    terminated: bool,
}

impl SseFrameParser {
    /// Feeds arbitrary bytes and drains every newly completed event.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }

        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(..split + 2);

            for line in frame.lines() {
                let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
                    continue;
                };
                if payload.is_empty() {
                    continue;
                }
                if payload == "[DONE]" {
                    self.terminated = true;
                    self.buffer.clear();
                    return events;
                }

                if let Ok(value) = serde_json::from_str::<Value>(payload) {
                    if let Some(event) = StreamEvent::from_value(&value) {
                        events.push(event);
                    }
                }
            }
        }

        events
    }

    /// Parses a complete SSE body in one shot (buffered mode).
    ///
    /// A trailing block without its closing delimiter is still parsed.
    pub fn parse_frames(input: &str) -> Vec<StreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.feed(b"\n\n"));
        events
    }

    /// True once the terminal sentinel has been seen.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// True when no unconsumed bytes remain buffered.
    #[must_use]
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}
