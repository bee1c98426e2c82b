//! Incremental UTF-8 capture of a byte stream.

/// Accumulates decoded text from arbitrary byte chunks.
///
/// Multibyte sequences split across chunk boundaries are carried over to
/// the next chunk. Once more than `limit` bytes have been seen the capture
/// is abandoned (the text is released) but the byte count keeps running.
#[derive(Debug)]
pub(crate) struct Utf8Capture {
    text: String,
    pending: Vec<u8>,
    seen: usize,
    limit: usize,
    overflowed: bool,
}

impl Utf8Capture {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            pending: Vec::new(),
            seen: 0,
            limit,
            overflowed: false,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.seen = self.seen.saturating_add(chunk.len());
        if self.overflowed {
            return;
        }
        if self.seen > self.limit {
            self.overflowed = true;
            self.text = String::new();
            self.pending = Vec::new();
            return;
        }
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.pending[..valid_up_to]) {
                        self.text.push_str(valid);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + bad);
                        }
                        None => {
                            // incomplete sequence at the end, wait for more bytes
                            self.pending.drain(..valid_up_to);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Total bytes observed, including any past the limit.
    pub(crate) fn bytes_seen(&self) -> usize {
        self.seen
    }

    /// Drop everything captured so far.
    pub(crate) fn discard(&mut self) {
        self.text = String::new();
        self.pending = Vec::new();
    }

    /// Finish the capture. `None` when the limit was exceeded.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.overflowed {
            return None;
        }
        if !self.pending.is_empty() {
            self.text.push(char::REPLACEMENT_CHARACTER);
            self.pending.clear();
        }
        Some(std::mem::take(&mut self.text))
    }
}
