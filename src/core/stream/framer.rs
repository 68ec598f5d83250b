//! Blank-line framing for the chat event stream.
//!
//! The framer is a pull-based state machine over raw bytes: callers `push`
//! whatever the transport hands them and then pull complete blocks until
//! [`EventFramer::next_block`] returns `None`. It never performs I/O itself,
//! so it can sit behind any chunked reader.

use memchr::memmem;

const LF_BOUNDARY: &[u8] = b"\n\n";
const CRLF_BOUNDARY: &[u8] = b"\r\n\r\n";

/// Splits a growing byte buffer into raw event blocks.
///
/// After every extraction pass the buffer holds no complete block, only the
/// (possibly empty) trailing fragment. One framer serves one response body.
#[derive(Debug, Default)]
pub struct EventFramer {
    buffer: Vec<u8>,
    /// Everything before this offset is known to hold no boundary.
    scan_from: usize,
    finished: bool,
}

impl EventFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes from the transport. Input after [`finish`](Self::finish) is dropped.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.finished {
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Extract the earliest complete block, consuming its boundary.
    pub fn next_block(&mut self) -> Option<String> {
        let Some((start, len)) = earliest_boundary(&self.buffer, self.scan_from) else {
            // A boundary completed by the next push starts at most 3 bytes back.
            self.scan_from = self.buffer.len().saturating_sub(CRLF_BOUNDARY.len() - 1);
            return None;
        };
        let block = String::from_utf8_lossy(&self.buffer[..start]).into_owned();
        self.buffer.drain(..start + len);
        self.scan_from = 0;
        Some(block)
    }

    /// Lazily drain every block that is currently complete.
    pub fn blocks(&mut self) -> impl Iterator<Item = String> + '_ {
        std::iter::from_fn(move || self.next_block())
    }

    /// Signal end of input and return the trailing fragment, if it carries anything.
    ///
    /// Complete blocks must be drained before calling this; any that remain are
    /// returned as part of the fragment rather than lost.
    pub fn finish(&mut self) -> Option<String> {
        self.finished = true;
        self.scan_from = 0;
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest);
        if text.trim().is_empty() {
            None
        } else {
            Some(text.into_owned())
        }
    }
}

/// Locate the earliest blank-line boundary at or after `from` as `(index, length)`.
///
/// When both forms start at the same index the CRLF form wins. With `\r` and
/// `\n` being distinct bytes that cannot actually happen, but the rule keeps
/// the choice deterministic.
fn earliest_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    let window = &buffer[from..];
    let lf = memmem::find(window, LF_BOUNDARY).map(|idx| (from + idx, LF_BOUNDARY.len()));
    let crlf = memmem::find(window, CRLF_BOUNDARY).map(|idx| (from + idx, CRLF_BOUNDARY.len()));

    match (lf, crlf) {
        (Some(lf), Some(crlf)) => {
            if crlf.0 <= lf.0 {
                Some(crlf)
            } else {
                Some(lf)
            }
        }
        (lf, crlf) => lf.or(crlf),
    }
}
