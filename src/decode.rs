//! Incremental UTF-8 decoding for process output that arrives in arbitrary chunks.
//!
//! Pipes hand out bytes in whatever sizes the OS chooses, so a multi-byte
//! character can be split across two reads. [`Utf8Decoder`] holds back an
//! incomplete trailing sequence until the rest of it arrives.

/// Decodes a byte stream chunk by chunk without splitting multi-byte characters.
///
/// Invalid sequences decode to U+FFFD, the same as [`String::from_utf8_lossy`].
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every character that is now complete.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            rest = tail;
                            break;
                        }
                    }
                }
            }
        }

        let leftover = rest.to_vec();
        self.pending = leftover;
        out
    }

    /// Flushes whatever is still held back. A truncated sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }

    /// Number of bytes currently held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Splits a chunked byte stream into complete text lines.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    decoder: Utf8Decoder,
    partial: String,
}

impl LineDecoder {
    /// Feeds one chunk, returning the lines it completed (without line endings).
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.push(chunk);
        self.partial.push_str(&text);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }

    /// Returns the final unterminated line, if there is one.
    pub(crate) fn finish(mut self) -> Option<String> {
        let tail = self.decoder.finish();
        self.partial.push_str(&tail);
        if self.partial.is_empty() {
            None
        } else {
            Some(self.partial)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(b"JPEG 800 600"), "JPEG 800 600");
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        // "é" is 0xC3 0xA9, "€" is 0xE2 0x82 0xAC
        let bytes = "café €5".as_bytes();
        let mut decoder = Utf8Decoder::new();

        let first = decoder.push(&bytes[..4]);
        assert_eq!(first, "caf");
        assert_eq!(decoder.pending_len(), 1);

        let second = decoder.push(&bytes[4..7]);
        assert_eq!(second, "é ");
        assert_eq!(decoder.pending_len(), 1);

        let third = decoder.push(&bytes[7..]);
        assert_eq!(third, "€5");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_decode() {
        let text = "Ünïcödé ✓ 日本語";
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            out.push_str(&decoder.push(std::slice::from_ref(b)));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_sequence_replaced_on_finish() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(b"ok\xE2\x82"), "ok");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_line_decoder_joins_partial_lines() {
        let mut lines = LineDecoder::default();
        assert!(lines.push(b"convert: unable").is_empty());
        assert_eq!(
            lines.push(b" to open\r\nidentify: warn"),
            vec!["convert: unable to open".to_string()]
        );
        assert_eq!(lines.push(b"ing\n"), vec!["identify: warning".to_string()]);
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_line_decoder_returns_unterminated_tail() {
        let mut lines = LineDecoder::default();
        assert!(lines.push(b"no newline").is_empty());
        assert_eq!(lines.finish().as_deref(), Some("no newline"));
    }
}
