/// Incremental UTF-8 decoder for byte streams whose chunk boundaries may
/// split multi-byte sequences. An incomplete trailing sequence is buffered
/// and completed by the next `push`; invalid bytes become U+FFFD.
#[derive(Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning all text that can be decoded so far.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_len]));
                    match e.error_len() {
                        // Invalid sequence in the middle: replace and keep going.
                        Some(bad_len) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid_len + bad_len);
                        }
                        // Incomplete trailing sequence: hold it for the next chunk.
                        None => {
                            self.pending.drain(..valid_len);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A dangling partial sequence decodes to U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        "\u{FFFD}".to_string()
    }
}
