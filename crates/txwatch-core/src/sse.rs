//! Incremental `text/event-stream` parser.
//!
//! Bytes arrive in arbitrary chunks; records are emitted only once their
//! terminating blank line has been seen. Handles `\n` and `\r\n` line endings,
//! `:` comment lines, multi-line `data:` fields and the optional single space
//! after the field colon.
//!
//! A line longer than [`MAX_LINE_BYTES`] is dropped together with the record
//! it belongs to; the parser resumes at the next line.

/// Longest line kept while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// One complete server-sent-event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseRecord {
    /// Event name; `"message"` when the record carried no `event:` field.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    /// Inside an oversized line; skip up to the next newline.
    discarding: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every record it completes.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let line = decode_line(&self.buffer[start..end]);
            start = end + 1;
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if let Some(record) = self.process_line(&line) {
                records.push(record);
            }
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(
                len = self.buffer.len(),
                limit = MAX_LINE_BYTES,
                "oversized event-stream line, dropping record"
            );
            self.buffer.clear();
            self.event = None;
            self.data.clear();
            self.id = None;
            self.discarding = true;
        }
        records
    }

    /// Flush at end of stream: an unterminated trailing frame is still emitted
    /// if it carried data.
    pub fn finish(&mut self) -> Option<SseRecord> {
        if std::mem::take(&mut self.discarding) {
            self.buffer.clear();
        }
        if !self.buffer.is_empty() {
            let line = decode_line(&self.buffer);
            self.buffer.clear();
            if let Some(record) = self.process_line(&line) {
                return Some(record);
            }
        }
        self.dispatch()
    }

    /// Returns `true` if bytes or fields are waiting for a record boundary.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || self.event.is_some() || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &str) -> Option<SseRecord> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` and unknown fields carry nothing we act on
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseRecord> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseRecord {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            id,
        })
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
