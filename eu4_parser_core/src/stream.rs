//! Byte-level tokenization for the save format.
//!
//! Game files use newlines both as whitespace and as value terminators, so a
//! token reader has to be able to stop on an arbitrary marker byte and rewind
//! precisely. OS-level streams cannot promise byte-exact seeks once newline
//! translation is involved, so the whole file is held in memory and the
//! reader works over that buffer.

/// How a terminating byte is handled once found: `rewind` leaves the cursor
/// on the marker so the next read sees it again, otherwise the cursor moves
/// just past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndMarker {
    pub byte: u8,
    pub rewind: bool,
}

impl EndMarker {
    pub const fn consume(byte: u8) -> EndMarker {
        return EndMarker {
            byte,
            rewind: false,
        };
    }
}

const KEY_MARKERS: &[EndMarker] = &[
    EndMarker::consume(b'='),
    EndMarker::consume(b'{'),
    EndMarker::consume(b'}'),
];
const VALUE_MARKERS: &[EndMarker] = &[
    EndMarker::consume(b'{'),
    EndMarker::consume(b'}'),
    EndMarker::consume(b'\n'),
];
const ARRAY_MARKERS: &[EndMarker] = &[EndMarker::consume(b'='), EndMarker::consume(b'}')];

/// A seekable cursor over a fully-loaded file.
#[derive(Debug)]
pub struct ByteStream<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteStream<'a> {
    pub fn new(text: &'a str) -> ByteStream<'a> {
        return ByteStream {
            buf: text.as_bytes(),
            pos: 0,
        };
    }

    pub fn tell(&self) -> usize {
        return self.pos;
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    pub fn at_eof(&self) -> bool {
        return self.pos >= self.buf.len();
    }

    /// Accumulates bytes until one of `markers` (or EOF) is hit, returning
    /// the token and the terminator. EOF reports `None` and never rewinds.
    ///
    /// All marker bytes are ASCII, so token boundaries always fall on UTF-8
    /// character boundaries and the token can be handed back as `&str`.
    pub fn read_token(&mut self, markers: &[EndMarker]) -> (&'a str, Option<u8>) {
        let buf = self.buf;
        let start = self.pos;
        let mut idx = start;
        while idx < buf.len() {
            let byte = buf[idx];
            if let Some(marker) = markers.iter().find(|m| m.byte == byte) {
                let token = &buf[start..idx];
                self.pos = if marker.rewind { idx } else { idx + 1 };
                return (token_str(token), Some(byte));
            }
            idx += 1;
        }
        self.pos = buf.len();
        return (token_str(&buf[start..]), None);
    }

    /// Reads up to a `=`, `{` or `}`. Keys swallow surrounding whitespace;
    /// the parser trims.
    pub fn read_key(&mut self) -> (&'a str, Option<u8>) {
        return self.read_token(KEY_MARKERS);
    }

    /// Reads up to a `{`, `}` or newline. Leading newline-terminated blank
    /// tokens are skipped so that `key =` followed by a line break still
    /// finds its value.
    pub fn read_value(&mut self) -> (&'a str, Option<u8>) {
        let (mut token, mut terminator) = self.read_token(VALUE_MARKERS);
        while token.trim().is_empty() && terminator == Some(b'\n') {
            (token, terminator) = self.read_token(VALUE_MARKERS);
        }
        return (token, terminator);
    }

    /// Reads the raw body of a candidate array: everything up to the closing
    /// `}`. Hitting `=` first means the block is actually a dict.
    pub fn read_array_body(&mut self) -> (&'a str, Option<u8>) {
        return self.read_token(ARRAY_MARKERS);
    }
}

fn token_str(bytes: &[u8]) -> &str {
    // the buffer came out of a String and marker bytes are ASCII
    return std::str::from_utf8(bytes).unwrap_or("");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_token_stops_on_marker() {
        let mut stream = ByteStream::new("abc=def");
        let (token, term) = stream.read_token(KEY_MARKERS);
        assert_eq!(token, "abc");
        assert_eq!(term, Some(b'='));
        assert_eq!(stream.tell(), 4);
    }

    #[test]
    fn test_read_token_rewinds_when_asked() {
        let markers = &[EndMarker {
            byte: b'}',
            rewind: true,
        }];
        let mut stream = ByteStream::new("abc}rest");
        let (token, term) = stream.read_token(markers);
        assert_eq!((token, term), ("abc", Some(b'}')));
        // cursor is back on the terminator
        let (token, term) = stream.read_token(markers);
        assert_eq!((token, term), ("", Some(b'}')));
        assert_eq!(stream.tell(), 3);
    }

    #[test]
    fn test_read_token_eof() {
        let mut stream = ByteStream::new("abc");
        let (token, term) = stream.read_token(KEY_MARKERS);
        assert_eq!((token, term), ("abc", None));
        assert!(stream.at_eof());

        let (token, term) = stream.read_token(KEY_MARKERS);
        assert_eq!((token, term), ("", None));
    }

    #[test]
    fn test_read_value_skips_blank_lines() {
        let mut stream = ByteStream::new("\n  \nvalue\nnext");
        let (token, term) = stream.read_value();
        assert_eq!((token, term), ("value", Some(b'\n')));
    }

    #[test]
    fn test_read_value_stops_on_braces() {
        let mut stream = ByteStream::new(" {inner}");
        let (token, term) = stream.read_value();
        assert_eq!((token, term), (" ", Some(b'{')));
    }

    #[test]
    fn test_read_array_body_rejects_dict_marker() {
        let mut stream = ByteStream::new(" a b c = d }");
        let (_, term) = stream.read_array_body();
        assert_eq!(term, Some(b'='));

        let mut stream = ByteStream::new(" a b c }");
        let (token, term) = stream.read_array_body();
        assert_eq!((token, term), (" a b c ", Some(b'}')));
    }

    #[test]
    fn test_seek_restores_position() {
        let mut stream = ByteStream::new("a=b=c");
        let pos = stream.tell();
        stream.read_key();
        stream.read_key();
        stream.seek(pos);
        let (token, _) = stream.read_key();
        assert_eq!(token, "a");
    }

    #[test]
    fn test_crlf_bytes_stay_in_token() {
        let mut stream = ByteStream::new("value\r\nnext");
        let (token, term) = stream.read_value();
        assert_eq!((token, term), ("value\r", Some(b'\n')));
    }
}
