//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network chunks do not respect event boundaries, so [`SseDecoder`] buffers
//! bytes until a full line is available and only then interprets it.  Only
//! `data:` fields are of interest to the chat stream; comments (`:`) and
//! other fields (`event:`, `id:`, `retry:`) are ignored.

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A JSON (or other) payload.
    Data(String),
    /// The OpenAI-style `[DONE]` terminator.
    Done,
}

/// Stateful line splitter for a server-sent event stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            self.feed_line(line, &mut events);
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest);
            self.feed_line(line.trim_end_matches('\r'), &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn feed_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        if self.data.is_empty() {
            return;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        if payload.trim() == "[DONE]" {
            events.push(SseEvent::Done);
        } else {
            events.push(SseEvent::Data(payload));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event() {
        let mut d = SseDecoder::new();
        let ev = d.push(b"data: {\"a\":1}\n\n");
        assert_eq!(ev, vec![SseEvent::Data("{\"a\":1}".into())]);
    }

    #[test]
    fn event_split_across_chunks() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"da").is_empty());
        assert!(d.push(b"ta: hel").is_empty());
        assert!(d.push(b"lo\n").is_empty());
        assert_eq!(d.push(b"\n"), vec![SseEvent::Data("hello".into())]);
    }

    #[test]
    fn crlf_and_comments() {
        let mut d = SseDecoder::new();
        let ev = d.push(b": keep-alive\r\n\r\ndata: x\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(ev, vec![SseEvent::Data("x".into()), SseEvent::Done]);
    }

    #[test]
    fn multiline_data_is_joined() {
        let mut d = SseDecoder::new();
        let ev = d.push(b"event: message\ndata: a\ndata: b\n\n");
        assert_eq!(ev, vec![SseEvent::Data("a\nb".into())]);
    }

    #[test]
    fn multibyte_text_split_mid_character() {
        let bytes = "data: کٲشُر\n\n".as_bytes();
        let mut d = SseDecoder::new();
        assert!(d.push(&bytes[..8]).is_empty());
        assert_eq!(d.push(&bytes[8..]), vec![SseEvent::Data("کٲشُر".into())]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: tail").is_empty());
        assert_eq!(d.finish(), vec![SseEvent::Data("tail".into())]);
    }
}
