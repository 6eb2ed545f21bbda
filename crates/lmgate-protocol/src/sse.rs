//! Incremental decoders for the stream formats the gateway speaks.

use bytes::Bytes;

/// One outbound or inbound SSE frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }

    /// Renders the frame in wire form (`event:` line optional).
    pub fn encode(&self) -> Bytes {
        let mut out = String::with_capacity(self.data.len() + 16);
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        out.push_str("data: ");
        out.push_str(&self.data);
        out.push_str("\n\n");
        Bytes::from(out)
    }
}

/// Incremental SSE frame parser.
///
/// Feed raw chunks as they arrive; complete frames come back in order.
/// Field lines other than `event:`/`data:` (`id:`, `retry:`, comments)
/// are skipped.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    pending_event: Option<String>,
    pending_data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let Ok(text) = std::str::from_utf8(chunk) else {
            return Vec::new();
        };
        self.buffer.push_str(text);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            self.consume_line(line, &mut frames);
        }
        frames
    }

    /// Flushes a final frame left without a trailing blank line.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.consume_line(line.trim_end_matches('\r'), &mut frames);
        }
        self.flush_pending(&mut frames);
        frames
    }

    fn consume_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            self.flush_pending(frames);
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => {
                self.pending_event = (!value.is_empty()).then(|| value.to_string());
            }
            "data" => self.pending_data.push(value.to_string()),
            _ => {}
        }
    }

    fn flush_pending(&mut self, frames: &mut Vec<SseFrame>) {
        if self.pending_event.is_none() && self.pending_data.is_empty() {
            return;
        }
        frames.push(SseFrame {
            event: self.pending_event.take(),
            data: std::mem::take(&mut self.pending_data).join("\n"),
        });
    }
}

/// Splits a Gemini-style stream into individual JSON documents.
///
/// Accepts both SSE `data:` framing and the raw JSON-array stream
/// (`[{...},\n{...}]`) the REST endpoint produces without `alt=sse`.
#[derive(Debug, Default)]
pub struct JsonStreamDecoder {
    sse: SseParser,
    buffer: String,
    array_mode: bool,
    decided: bool,
}

impl JsonStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if !self.decided {
            if let Ok(text) = std::str::from_utf8(chunk) {
                if let Some(first) = text.trim_start().chars().next() {
                    self.array_mode = first == '[' || first == '{';
                    self.decided = true;
                }
            }
        }
        if self.array_mode {
            if let Ok(text) = std::str::from_utf8(chunk) {
                self.buffer.push_str(text);
            }
            self.drain_documents()
        } else {
            self.sse
                .push(chunk)
                .into_iter()
                .map(|frame| frame.data)
                .collect()
        }
    }

    pub fn finish(&mut self) -> Vec<String> {
        if self.array_mode {
            self.drain_documents()
        } else {
            self.sse
                .finish()
                .into_iter()
                .map(|frame| frame.data)
                .collect()
        }
    }

    /// Scans for balanced top-level `{...}` documents, ignoring braces
    /// inside JSON strings.
    fn drain_documents(&mut self) -> Vec<String> {
        let mut documents = Vec::new();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut start = None;
        let mut consumed = 0;

        for (idx, ch) in self.buffer.char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }
            match ch {
                '"' => in_string = true,
                '{' => {
                    if depth == 0 {
                        start = Some(idx);
                    }
                    depth += 1;
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let Some(begin) = start.take() {
                            documents.push(self.buffer[begin..=idx].to_string());
                            consumed = idx + ch.len_utf8();
                        }
                    }
                }
                _ => {}
            }
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_event_frames_across_chunks() {
        let mut parser = SseParser::new();
        let mut frames = parser.push(b"event: message_start\ndata: {\"a\"");
        assert!(frames.is_empty());
        frames.extend(parser.push(b":1}\n\ndata: tail\n\n"));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("message_start"));
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[1].event, None);
        assert_eq!(frames[1].data, "tail");
    }

    #[test]
    fn finish_flushes_incomplete_frame() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: {\"done\":true}").is_empty());
        let frames = parser.finish();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"done\":true}");
    }

    #[test]
    fn json_array_stream_splits_documents() {
        let mut decoder = JsonStreamDecoder::new();
        let mut docs = decoder.push(b"[{\"x\":\"a}b\"},");
        docs.extend(decoder.push(b"{\"y\":2}]"));
        assert_eq!(docs, vec!["{\"x\":\"a}b\"}", "{\"y\":2}"]);
    }

    #[test]
    fn sse_mode_passes_data_lines() {
        let mut decoder = JsonStreamDecoder::new();
        let docs = decoder.push(b"data: {\"z\":3}\n\n");
        assert_eq!(docs, vec!["{\"z\":3}"]);
    }
}
