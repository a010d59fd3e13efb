//! Incremental UTF-8 decoding of pipe reads

/// Decodes a byte stream into text across arbitrary read boundaries
///
/// An incomplete trailing code point is held until the next read; invalid
/// sequences are replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    partial: Vec<u8>,
}

impl Utf8Decoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next read, returning all text that is complete so far
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.partial.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.partial.len());
        loop {
            match std::str::from_utf8(&self.partial) {
                Ok(text) => {
                    out.push_str(text);
                    self.partial.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.partial[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.partial.drain(..valid + bad);
                        }
                        None => {
                            // Truncated code point; wait for the rest
                            self.partial.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is held at end of stream
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        rest
    }

    /// Number of bytes currently held back
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}
