//! Line Reader — turns a byte stream into a lazy sequence of decoded text
//! lines with 1-based line numbers.
//!
//! Concatenates incoming chunks into an internal buffer and splits on `\n`.
//! A trailing `\r` is preserved, never stripped. Truncation at
//! `max_line_length` is greedy and repeated: bytes are never silently
//! dropped, only re-chunked into additional emitted lines.

use std::io::{BufRead, Read};

use crate::errors::ReaderError;

/// Byte-to-text mapping applied to each line before it's handed to a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Utf16Le,
    Ucs2,
    Base64,
    Latin1,
    Binary,
    Hex,
}

impl Encoding {
    fn decode(self, bytes: &[u8]) -> Result<String, ReaderError> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| ReaderError::Decode(format!("invalid utf8: {e}"))),
            Encoding::Ascii => {
                if bytes.iter().any(|b| !b.is_ascii()) {
                    Err(ReaderError::Decode("non-ascii byte in ascii-encoded line".into()))
                } else {
                    Ok(bytes.iter().map(|&b| b as char).collect())
                }
            }
            Encoding::Latin1 | Encoding::Binary => Ok(bytes.iter().map(|&b| b as char).collect()),
            Encoding::Hex => Ok(hex_encode(bytes)),
            Encoding::Base64 => Ok(base64_encode(bytes)),
            Encoding::Utf16Le | Encoding::Ucs2 => {
                if bytes.len() % 2 != 0 {
                    return Err(ReaderError::Decode(
                        "odd byte count for utf16le/ucs2 line".into(),
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map_err(|e| ReaderError::Decode(format!("invalid utf16le/ucs2: {e}")))
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn base64_encode(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 {
            TABLE[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            TABLE[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

/// Configuration for a [`LineReader`].
#[derive(Debug, Clone)]
pub struct LineReaderOptions {
    /// Upper bound on a single emitted line. Default is effectively
    /// unbounded (`usize::MAX`) — truncation is opt-in (see SPEC_FULL OQ-4).
    pub max_line_length: usize,
    pub encoding: Encoding,
    /// Whether lines whose trimmed form is empty are emitted.
    pub include_empty: bool,
}

impl Default for LineReaderOptions {
    fn default() -> Self {
        Self {
            max_line_length: usize::MAX,
            encoding: Encoding::Utf8,
            include_empty: false,
        }
    }
}

/// A decoded, numbered line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// 1-based; increments once per emitted line (see `include_empty`).
    pub number: u64,
    pub text: String,
}

/// Pulls lines out of a byte source one at a time.
///
/// The underlying source is acquired on first pull and released exactly
/// once on any terminal condition (EOF, error, or drop).
pub struct LineReader<R> {
    source: Option<R>,
    options: LineReaderOptions,
    buf: Vec<u8>,
    line_number: u64,
    eof: bool,
    /// Residual partial line pending emission at EOF.
    pending_final: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(source: R, options: LineReaderOptions) -> Self {
        Self {
            source: Some(source),
            options,
            buf: Vec::new(),
            line_number: 0,
            eof: false,
            pending_final: false,
        }
    }

    /// Release the underlying source. Safe to call more than once; only the
    /// first call has an effect.
    fn release(&mut self) {
        self.source = None;
    }

    fn decode_and_emit(&mut self, bytes: Vec<u8>) -> Result<Option<Line>, ReaderError> {
        let trimmed_empty = bytes.iter().all(|b| b.is_ascii_whitespace());
        if trimmed_empty && !self.options.include_empty {
            return Ok(None);
        }
        let text = self.options.encoding.decode(&bytes)?;
        self.line_number += 1;
        Ok(Some(Line {
            number: self.line_number,
            text,
        }))
    }

    /// Pull the next decoded line, or `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<Line>, ReaderError> {
        loop {
            // A newline within the cap always delimits normally, even once
            // the buffer has grown past max_line_length from prior short
            // lines sharing the same read chunk; only truncate at the cap
            // when no newline occurs within the first max_line_length bytes.
            let newline_pos = self.buf.iter().position(|&b| b == b'\n');
            let within_cap = newline_pos.is_some_and(|pos| {
                self.options.max_line_length == 0 || pos < self.options.max_line_length
            });

            if let Some(pos) = newline_pos.filter(|_| within_cap) {
                let mut chunk: Vec<u8> = self.buf.drain(..=pos).collect();
                chunk.pop(); // drop the '\n' terminator; a trailing '\r' survives
                if let Some(line) = self.decode_and_emit(chunk)? {
                    return Ok(Some(line));
                }
                continue;
            }

            // Greedy truncation: emit as soon as the buffer reaches the cap,
            // even without a newline in sight.
            if self.buf.len() >= self.options.max_line_length && self.options.max_line_length > 0 {
                let rest = self.buf.split_off(self.options.max_line_length);
                let chunk = std::mem::replace(&mut self.buf, rest);
                if let Some(line) = self.decode_and_emit(chunk)? {
                    return Ok(Some(line));
                }
                continue;
            }

            if self.eof {
                if self.pending_final {
                    self.pending_final = false;
                    let chunk = std::mem::take(&mut self.buf);
                    if let Some(line) = self.decode_and_emit(chunk)? {
                        return Ok(Some(line));
                    }
                }
                self.release();
                return Ok(None);
            }

            let mut chunk = [0u8; 8192];
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };
            let read = match source.read(&mut chunk) {
                Ok(n) => n,
                Err(e) => {
                    self.release();
                    return Err(ReaderError::Io(e));
                }
            };
            if read == 0 {
                self.eof = true;
                self.pending_final = !self.buf.is_empty();
                continue;
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Consume the reader as an iterator of `Result<Line, ReaderError>`.
    pub fn into_iter(self) -> LineReaderIter<R> {
        LineReaderIter { inner: self }
    }
}

impl<R: BufRead> LineReader<R> {
    /// Convenience constructor over a buffered reader (e.g. stdin).
    pub fn buffered(source: R, options: LineReaderOptions) -> Self {
        Self::new(source, options)
    }
}

/// Iterator adapter over [`LineReader`].
pub struct LineReaderIter<R> {
    inner: LineReader<R>,
}

impl<R: Read> Iterator for LineReaderIter<R> {
    type Item = Result<Line, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines_of(input: &str, options: LineReaderOptions) -> Vec<String> {
        let reader = LineReader::new(Cursor::new(input.as_bytes().to_vec()), options);
        reader
            .into_iter()
            .map(|l| l.unwrap().text)
            .collect()
    }

    #[test]
    fn splits_on_newline_and_drops_empty_by_default() {
        let lines = lines_of("a\nb\n\nc", LineReaderOptions::default());
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn include_empty_keeps_blank_lines() {
        let options = LineReaderOptions {
            include_empty: true,
            ..Default::default()
        };
        let lines = lines_of("a\n\nb", options);
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn preserves_trailing_carriage_return() {
        let lines = lines_of("a\r\nb\r\n", LineReaderOptions::default());
        assert_eq!(lines, vec!["a\r", "b\r"]);
    }

    #[test]
    fn emits_residual_partial_line_once_at_eof() {
        let lines = lines_of("a\nb", LineReaderOptions::default());
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn empty_source_yields_no_lines() {
        let lines = lines_of("", LineReaderOptions::default());
        assert!(lines.is_empty());
    }

    #[test]
    fn line_numbering_is_monotonic_and_one_based() {
        let reader = LineReader::new(Cursor::new(b"a\nb\nc\n".to_vec()), LineReaderOptions::default());
        let numbers: Vec<u64> = reader.into_iter().map(|l| l.unwrap().number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn line_numbering_counts_blanks_when_include_empty() {
        let options = LineReaderOptions {
            include_empty: true,
            ..Default::default()
        };
        let reader = LineReader::new(Cursor::new(b"a\n\nb\n".to_vec()), options);
        let numbers: Vec<u64> = reader.into_iter().map(|l| l.unwrap().number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn line_at_exactly_max_length_is_one_line() {
        let options = LineReaderOptions {
            max_line_length: 5,
            ..Default::default()
        };
        let lines = lines_of("abcde\n", options);
        assert_eq!(lines, vec!["abcde"]);
    }

    #[test]
    fn line_exceeding_max_length_truncates_greedily_and_repeatedly() {
        let options = LineReaderOptions {
            max_line_length: 3,
            ..Default::default()
        };
        // No newline at all: input length 10 covered fully across multiple emissions.
        let lines = lines_of("abcdefghij", options);
        assert_eq!(lines, vec!["abc", "def", "ghi", "j"]);
    }

    #[test]
    fn truncation_then_newline_still_delimits_normally() {
        let options = LineReaderOptions {
            max_line_length: 3,
            ..Default::default()
        };
        let lines = lines_of("abcdef\nxy\n", options);
        assert_eq!(lines, vec!["abc", "def", "xy"]);
    }

    #[test]
    fn hex_encoding_decodes_bytes_as_hex_text() {
        let options = LineReaderOptions {
            encoding: Encoding::Hex,
            ..Default::default()
        };
        let lines = lines_of("ab\n", options);
        assert_eq!(lines, vec!["6162"]);
    }

    #[test]
    fn ascii_encoding_rejects_non_ascii_bytes() {
        let options = LineReaderOptions {
            encoding: Encoding::Ascii,
            ..Default::default()
        };
        let reader = LineReader::new(Cursor::new("héllo\n".as_bytes().to_vec()), options);
        let results: Vec<_> = reader.into_iter().collect();
        assert!(results[0].is_err());
    }

    #[test]
    fn source_is_released_after_eof() {
        let mut reader = LineReader::new(Cursor::new(b"a\n".to_vec()), LineReaderOptions::default());
        assert!(reader.next_line().unwrap().is_some());
        assert!(reader.next_line().unwrap().is_none());
        assert!(reader.source.is_none());
        // Calling again after release is a no-op, not a re-release/panic.
        assert!(reader.next_line().unwrap().is_none());
    }
}
