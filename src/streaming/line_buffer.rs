//! Line framing for streamed response bodies
//!
//! Splits raw bytes on `\n` and carries any partial trailing line into the
//! next `feed`. Splitting happens on bytes, so a multi-byte UTF-8 character
//! cut across two network chunks is reassembled before decoding.

/// Terminator sent by OpenAI-style providers after the last chunk.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Accumulates bytes and yields complete textual frames.
///
/// One buffer serves exactly one stream.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every frame completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(Self::frame)
            .collect()
    }

    /// Flush the trailing line of a body that did not end with `\n`.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        Self::frame(&rest)
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn frame(line: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') || is_done_sentinel(trimmed) {
            return None;
        }
        Some(trimmed.to_string())
    }
}

fn is_done_sentinel(line: &str) -> bool {
    line == DONE_SENTINEL
        || line
            .strip_prefix("data:")
            .is_some_and(|rest| rest.trim() == DONE_SENTINEL)
}
