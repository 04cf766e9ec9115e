//! Server-sent-event line framing.
//!
//! Network chunks may split a line, or a multi-byte UTF-8 character, at any
//! byte. Bytes are buffered until a full `\n`-terminated line is available and
//! only complete lines are decoded.

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseLine {
    /// The payload of a `data:` line
    Data(String),
    /// The `data: [DONE]` terminator
    Done,
}

#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and drain every complete line they finish.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            if let Some(line) = parse_line(text.trim_end_matches('\r')) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a trailing line that arrived without a newline.
    pub(crate) fn finish(&mut self) -> Option<SseLine> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&raw);
        parse_line(text.trim_end_matches('\r'))
    }
}

fn parse_line(line: &str) -> Option<SseLine> {
    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        Some(SseLine::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseLine::Data(data.to_string()))
    }
}
