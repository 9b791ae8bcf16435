use crate::{Error, HexCase, Result, StringEncoding};
use std::io::{Read, Seek, SeekFrom};

/// Size of the window buffered from the current position of the source.
pub const BUFFER_SIZE: usize = 16 * 1024;

/// Sentinel returned by `read_char` at end of input.
const EOF_CHAR: i32 = -1;

const MAX_BRACKET: usize = 100;

/// Token classes produced by [`Lexer::scan_next_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    None,
    Comment,
    Integer,
    UInteger,
    Real,
    Boolean,
    Null,
    Name,
    String,
    HexString,
    UnicodeString,
    UnicodeHexString,
    R,
    Obj,
    EndObj,
    BeginStream,
    EndStream,
    XRef,
    Trailer,
    StartXRef,
    BeginArray,
    EndArray,
    BeginDictionary,
    EndDictionary,
    Keyword,
    Eof,
}

impl Symbol {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Symbol::None => "nothing",
            Symbol::Comment => "comment",
            Symbol::Integer => "integer",
            Symbol::UInteger => "unsigned integer",
            Symbol::Real => "real",
            Symbol::Boolean => "boolean",
            Symbol::Null => "null",
            Symbol::Name => "name",
            Symbol::String => "string",
            Symbol::HexString => "hex string",
            Symbol::UnicodeString => "unicode string",
            Symbol::UnicodeHexString => "unicode hex string",
            Symbol::R => "R",
            Symbol::Obj => "obj",
            Symbol::EndObj => "endobj",
            Symbol::BeginStream => "stream",
            Symbol::EndStream => "endstream",
            Symbol::XRef => "xref",
            Symbol::Trailer => "trailer",
            Symbol::StartXRef => "startxref",
            Symbol::BeginArray => "[",
            Symbol::EndArray => "]",
            Symbol::BeginDictionary => "<<",
            Symbol::EndDictionary => ">>",
            Symbol::Keyword => "keyword",
            Symbol::Eof => "end of file",
        }
    }
}

/// PDF whitespace plus bytes 11 and 173, both observed in legacy files.
#[inline]
pub(crate) fn is_whitespace(c: i32) -> bool {
    matches!(c, 0 | 9 | 10 | 11 | 12 | 13 | 32 | 173)
}

#[inline]
pub(crate) fn is_delimiter(c: i32) -> bool {
    matches!(c as u8 as char, '(' | ')' | '<' | '>' | '[' | ']' | '{' | '}' | '/' | '%') && c >= 0
}

#[inline]
fn is_regular(c: i32) -> bool {
    c != EOF_CHAR && !is_whitespace(c) && !is_delimiter(c)
}

#[inline]
fn hex_value(c: i32) -> Option<u8> {
    match c as u8 {
        b'0'..=b'9' => Some(c as u8 - b'0'),
        b'a'..=b'f' => Some(c as u8 - b'a' + 10),
        b'A'..=b'F' => Some(c as u8 - b'A' + 10),
        _ => None,
    }
}

/// Byte-level tokenizer over a seekable source.
///
/// A window of [`BUFFER_SIZE`] bytes is buffered from the current position;
/// seeking moves both the window and the underlying source. The lexer never
/// suspends and never retries; failures surface as parser diagnostics.
pub struct Lexer<R: Read + Seek> {
    source: R,
    source_len: u64,
    window: Vec<u8>,
    window_start: u64,
    position: u64,
    symbol: Symbol,
    token: Vec<u8>,
    bool_value: bool,
    hex_upper: bool,
    string_encoding: StringEncoding,
}

impl<R: Read + Seek> Lexer<R> {
    pub fn new(mut source: R) -> Result<Self> {
        let source_len = source.seek(SeekFrom::End(0))?;
        Ok(Lexer {
            source,
            source_len,
            window: Vec::new(),
            window_start: 0,
            position: 0,
            symbol: Symbol::None,
            token: Vec::new(),
            bool_value: false,
            hex_upper: false,
            string_encoding: StringEncoding::Raw,
        })
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    pub fn len(&self) -> u64 {
        self.source_len
    }

    pub fn is_empty(&self) -> bool {
        self.source_len == 0
    }

    /// Position of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Seeks both the underlying source and the buffered window.
    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Bytes of the most recent token.
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    pub fn bool_value(&self) -> bool {
        self.bool_value
    }

    /// Case observed while scanning the most recent hex string.
    pub fn hex_case(&self) -> HexCase {
        if self.hex_upper {
            HexCase::Upper
        } else {
            HexCase::Lower
        }
    }

    /// Encoding of the most recent string token, derived from its BOM.
    pub fn string_encoding(&self) -> StringEncoding {
        self.string_encoding
    }

    fn token_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.token).map_err(|_| self.syntax_error("token is not valid ascii"))
    }

    pub fn token_i32(&self) -> Result<i32> {
        self.token_str()?
            .parse()
            .map_err(|_| self.syntax_error("expected a 32-bit integer"))
    }

    pub fn token_u32(&self) -> Result<u32> {
        self.token_str()?
            .parse()
            .map_err(|_| self.syntax_error("expected an unsigned 32-bit integer"))
    }

    /// Parses the token as an unsigned 64-bit value, independent of how the
    /// number was classified. Byte offsets use this.
    pub fn token_u64(&self) -> Result<u64> {
        self.token_str()?
            .parse()
            .map_err(|_| self.syntax_error("expected a byte offset"))
    }

    pub fn token_f64(&self) -> Result<f64> {
        self.token_str()?
            .parse()
            .map_err(|_| self.syntax_error("expected a number"))
    }

    pub(crate) fn syntax_error(&self, message: &str) -> Error {
        Error::Syntax {
            offset: self.position,
            message: message.to_string(),
        }
    }

    fn fill_window(&mut self, at: u64) -> Result<()> {
        self.source.seek(SeekFrom::Start(at))?;
        self.window_start = at;
        self.window.resize(BUFFER_SIZE.min((self.source_len - at) as usize), 0);
        self.source.read_exact(&mut self.window)?;
        Ok(())
    }

    /// Consumes and returns the next byte, or the EOF sentinel.
    fn read_char(&mut self) -> Result<i32> {
        let c = self.peek_char()?;
        if c != EOF_CHAR {
            self.position += 1;
        }
        Ok(c)
    }

    fn peek_char(&mut self) -> Result<i32> {
        if self.position >= self.source_len {
            return Ok(EOF_CHAR);
        }
        if self.position < self.window_start || self.position >= self.window_start + self.window.len() as u64 {
            self.fill_window(self.position)?;
        }
        Ok(i32::from(self.window[(self.position - self.window_start) as usize]))
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while is_whitespace(self.peek_char()?) {
            self.position += 1;
        }
        Ok(())
    }

    /// Scans the next token and returns its symbol. The token bytes are
    /// available through [`Lexer::token`] afterwards.
    pub fn scan_next_token(&mut self) -> Result<Symbol> {
        self.token.clear();
        self.skip_whitespace()?;

        let c = self.read_char()?;
        let symbol = match c {
            EOF_CHAR => Symbol::Eof,
            c if c as u8 == b'%' => self.scan_comment()?,
            c if c as u8 == b'/' => self.scan_name()?,
            c if c as u8 == b'(' => self.scan_literal_string()?,
            c if c as u8 == b'<' => {
                if self.peek_char()? as u8 == b'<' {
                    self.position += 1;
                    Symbol::BeginDictionary
                } else {
                    self.scan_hex_string()?
                }
            }
            c if c as u8 == b'>' => {
                if self.read_char()? as u8 == b'>' {
                    Symbol::EndDictionary
                } else {
                    return Err(self.syntax_error("expected '>>'"));
                }
            }
            c if c as u8 == b'[' => Symbol::BeginArray,
            c if c as u8 == b']' => Symbol::EndArray,
            c if matches!(c as u8, b'+' | b'-' | b'.' | b'0'..=b'9') => self.scan_number(c as u8)?,
            c if (c as u8).is_ascii_alphabetic() => self.scan_keyword(c as u8)?,
            _ => return Err(self.syntax_error("unexpected character")),
        };
        self.symbol = symbol;
        Ok(symbol)
    }

    fn scan_comment(&mut self) -> Result<Symbol> {
        loop {
            match self.peek_char()? {
                EOF_CHAR => break,
                c if matches!(c as u8, b'\r' | b'\n') => break,
                c => {
                    self.token.push(c as u8);
                    self.position += 1;
                }
            }
        }
        Ok(Symbol::Comment)
    }

    /// `#xx` sequences in names decode to the escaped byte.
    fn scan_name(&mut self) -> Result<Symbol> {
        loop {
            let c = self.peek_char()?;
            if !is_regular(c) {
                break;
            }
            self.position += 1;
            if c as u8 == b'#' {
                let hi = hex_value(self.read_char()?).ok_or_else(|| self.syntax_error("invalid #-escape in name"))?;
                let lo = hex_value(self.read_char()?).ok_or_else(|| self.syntax_error("invalid #-escape in name"))?;
                self.token.push(hi << 4 | lo);
            } else {
                self.token.push(c as u8);
            }
        }
        Ok(Symbol::Name)
    }

    fn scan_number(&mut self, first: u8) -> Result<Symbol> {
        self.token.push(first);
        let mut seen_point = first == b'.';
        loop {
            let c = self.peek_char()?;
            match c as u8 {
                b'0'..=b'9' if c >= 0 => self.token.push(c as u8),
                b'.' if c >= 0 => {
                    if seen_point {
                        return Err(self.syntax_error("number has more than one decimal point"));
                    }
                    seen_point = true;
                    self.token.push(b'.');
                }
                _ => break,
            }
            self.position += 1;
        }
        if seen_point {
            self.token_f64()?;
            return Ok(Symbol::Real);
        }
        // Fits i32: Integer. Fits u32: UInteger. Degrades to Real otherwise.
        if self.token_i32().is_ok() {
            Ok(Symbol::Integer)
        } else if self.token_u32().is_ok() {
            Ok(Symbol::UInteger)
        } else {
            self.token_f64()?;
            Ok(Symbol::Real)
        }
    }

    fn scan_keyword(&mut self, first: u8) -> Result<Symbol> {
        self.token.push(first);
        while is_regular(self.peek_char()?) {
            let c = self.read_char()?;
            self.token.push(c as u8);
        }
        let symbol = match self.token.as_slice() {
            b"obj" => Symbol::Obj,
            b"endobj" => Symbol::EndObj,
            b"stream" => {
                self.move_past_stream_keyword()?;
                Symbol::BeginStream
            }
            b"endstream" => Symbol::EndStream,
            b"xref" => Symbol::XRef,
            b"trailer" => Symbol::Trailer,
            b"startxref" => Symbol::StartXRef,
            b"true" => {
                self.bool_value = true;
                Symbol::Boolean
            }
            b"false" => {
                self.bool_value = false;
                Symbol::Boolean
            }
            b"null" => Symbol::Null,
            b"R" => Symbol::R,
            _ => Symbol::Keyword,
        };
        Ok(symbol)
    }

    /// Only LF or CR-LF delimit the stream payload. A bare CR is
    /// re-positioned so the parser can enforce the rule.
    fn move_past_stream_keyword(&mut self) -> Result<()> {
        match self.peek_char()? {
            c if c as u8 == b'\n' && c >= 0 => {
                self.position += 1;
            }
            c if c as u8 == b'\r' && c >= 0 => {
                self.position += 1;
                if self.peek_char()? as u8 == b'\n' {
                    self.position += 1;
                } else {
                    self.position -= 1;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// True when the byte at the current position is a CR not followed by LF.
    pub(crate) fn at_bare_carriage_return(&mut self) -> Result<bool> {
        if self.peek_char()? as u8 != b'\r' {
            return Ok(false);
        }
        self.position += 1;
        let next = self.peek_char()?;
        self.position -= 1;
        Ok(next as u8 != b'\n')
    }

    fn scan_literal_string(&mut self) -> Result<Symbol> {
        let mut depth = 1usize;
        loop {
            let c = self.read_char()?;
            match c {
                EOF_CHAR => return Err(self.syntax_error("unterminated string")),
                c if c as u8 == b'\\' => self.scan_string_escape()?,
                c if c as u8 == b'(' => {
                    depth += 1;
                    if depth > MAX_BRACKET {
                        return Err(self.syntax_error("string brackets nested too deep"));
                    }
                    self.token.push(b'(');
                }
                c if c as u8 == b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    self.token.push(b')');
                }
                c => self.token.push(c as u8),
            }
        }
        Ok(self.tag_string_encoding())
    }

    fn scan_string_escape(&mut self) -> Result<()> {
        let c = self.read_char()?;
        match c {
            EOF_CHAR => return Err(self.syntax_error("unterminated string escape")),
            c if c as u8 == b'n' => self.token.push(b'\n'),
            c if c as u8 == b'r' => self.token.push(b'\r'),
            c if c as u8 == b't' => self.token.push(b'\t'),
            c if c as u8 == b'b' => self.token.push(b'\x08'),
            c if c as u8 == b'f' => self.token.push(b'\x0C'),
            c if matches!(c as u8, b'(' | b')' | b'\\') => self.token.push(c as u8),
            // Backslash before an end of line continues the line.
            c if c as u8 == b'\r' => {
                if self.peek_char()? as u8 == b'\n' {
                    self.position += 1;
                }
            }
            c if c as u8 == b'\n' => {}
            c if matches!(c as u8, b'0'..=b'7') => {
                let mut value = u16::from(c as u8 - b'0');
                for _ in 0..2 {
                    match self.peek_char()? {
                        d if matches!(d as u8, b'0'..=b'7') && d >= 0 => {
                            value = value * 8 + u16::from(d as u8 - b'0');
                            self.position += 1;
                        }
                        _ => break,
                    }
                }
                // Overflow past one byte is ignored.
                self.token.push(value as u8);
            }
            c => self.token.push(c as u8),
        }
        Ok(())
    }

    fn scan_hex_string(&mut self) -> Result<Symbol> {
        self.hex_upper = false;
        let mut pending: Option<u8> = None;
        loop {
            let c = self.read_char()?;
            match c {
                EOF_CHAR => return Err(self.syntax_error("unterminated hex string")),
                c if c as u8 == b'>' => break,
                c if is_whitespace(c) => {}
                c => {
                    let value = hex_value(c).ok_or_else(|| self.syntax_error("invalid hex digit"))?;
                    if (c as u8).is_ascii_uppercase() {
                        self.hex_upper = true;
                    }
                    match pending.take() {
                        Some(hi) => self.token.push(hi << 4 | value),
                        None => pending = Some(value),
                    }
                }
            }
        }
        // A dangling final digit is zero-padded.
        if let Some(hi) = pending {
            self.token.push(hi << 4);
        }
        // The BOM stays part of the bytes; hex strings round-trip verbatim.
        if self.token.starts_with(&[0xFE, 0xFF]) {
            self.string_encoding = StringEncoding::Utf16Be;
            Ok(Symbol::UnicodeHexString)
        } else if self.token.starts_with(&[0xFF, 0xFE]) {
            self.string_encoding = StringEncoding::Utf16Le;
            Ok(Symbol::UnicodeHexString)
        } else {
            self.string_encoding = StringEncoding::Raw;
            Ok(Symbol::HexString)
        }
    }

    fn tag_string_encoding(&mut self) -> Symbol {
        if self.token.starts_with(&[0xFE, 0xFF]) {
            self.token.drain(..2);
            self.string_encoding = StringEncoding::Utf16Be;
            Symbol::UnicodeString
        } else if self.token.starts_with(&[0xFF, 0xFE]) {
            self.token.drain(..2);
            self.string_encoding = StringEncoding::Utf16Le;
            Symbol::UnicodeString
        } else {
            self.string_encoding = StringEncoding::Raw;
            Symbol::String
        }
    }

    /// Reads `length` raw payload bytes from the current position.
    pub fn read_stream(&mut self, length: usize) -> Result<Vec<u8>> {
        if self.position + length as u64 > self.source_len {
            return Err(Error::StreamLength);
        }
        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            if self.position < self.window_start || self.position >= self.window_start + self.window.len() as u64 {
                self.fill_window(self.position)?;
            }
            let offset = (self.position - self.window_start) as usize;
            let take = (length - out.len()).min(self.window.len() - offset);
            out.extend_from_slice(&self.window[offset..offset + take]);
            self.position += take as u64;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lexer(bytes: &[u8]) -> Lexer<Cursor<&[u8]>> {
        Lexer::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn number_classification() {
        let mut lx = lexer(b"+123 -0.25 2996984786 264584027963392 10. .5");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Integer);
        assert_eq!(lx.token_i32().unwrap(), 123);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Real);
        assert_eq!(lx.token_f64().unwrap(), -0.25);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::UInteger);
        assert_eq!(lx.token_u32().unwrap(), 2_996_984_786);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Real);
        assert_eq!(lx.token_f64().unwrap(), 264_584_027_963_392.0);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Real);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Real);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Eof);
    }

    #[test]
    fn double_decimal_point_is_an_error() {
        let mut lx = lexer(b"1.2.3");
        assert!(lx.scan_next_token().is_err());
    }

    #[test]
    fn literal_strings() {
        let mut lx = lexer(b"() (text()) (text\\r\\n\\\\(nested\\t\\b\\f)) (text\\0\\53\\053\\0053) (line\\\ncont)");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::String);
        assert_eq!(lx.token(), b"");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::String);
        assert_eq!(lx.token(), b"text()");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::String);
        assert_eq!(lx.token(), b"text\r\n\\(nested\t\x08\x0C)");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::String);
        assert_eq!(lx.token(), b"text\0++\x053");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::String);
        assert_eq!(lx.token(), b"linecont");
    }

    #[test]
    fn unicode_strings() {
        let mut lx = lexer(b"(\xFE\xFF\x00H\x00i) (\xFF\xFEH\x00i\x00) (\xFE\xFF)");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::UnicodeString);
        assert_eq!(lx.string_encoding(), StringEncoding::Utf16Be);
        assert_eq!(lx.token(), b"\x00H\x00i");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::UnicodeString);
        assert_eq!(lx.string_encoding(), StringEncoding::Utf16Le);
        // BOM-prefixed empty body: a zero-length unicode string.
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::UnicodeString);
        assert_eq!(lx.token(), b"");
    }

    #[test]
    fn hex_strings() {
        let mut lx = lexer(b"<4A 4B> <4a4b> <901FA> <FEFF0041>");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::HexString);
        assert_eq!(lx.token(), b"JK");
        assert_eq!(lx.hex_case(), HexCase::Upper);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::HexString);
        assert_eq!(lx.token(), b"JK");
        assert_eq!(lx.hex_case(), HexCase::Lower);
        // Dangling digit is padded with zero.
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::HexString);
        assert_eq!(lx.token(), b"\x90\x1F\xA0");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::UnicodeHexString);
        assert_eq!(lx.token(), b"\xFE\xFF\x00A");
    }

    #[test]
    fn names_decode_hash_escapes() {
        let mut lx = lexer(b"/Type /ABC#5f /#cb#ce#cc#e5");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Name);
        assert_eq!(lx.token(), b"Type");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Name);
        assert_eq!(lx.token(), b"ABC\x5F");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Name);
        assert_eq!(lx.token(), b"\xcb\xce\xcc\xe5");
    }

    #[test]
    fn keywords_and_structure() {
        let mut lx = lexer(b"1 0 obj << /A [true null] >> endobj xref trailer startxref 5 0 R");
        let expected = [
            Symbol::Integer,
            Symbol::Integer,
            Symbol::Obj,
            Symbol::BeginDictionary,
            Symbol::Name,
            Symbol::BeginArray,
            Symbol::Boolean,
            Symbol::Null,
            Symbol::EndArray,
            Symbol::EndDictionary,
            Symbol::EndObj,
            Symbol::XRef,
            Symbol::Trailer,
            Symbol::StartXRef,
            Symbol::Integer,
            Symbol::Integer,
            Symbol::R,
        ];
        for symbol in expected {
            assert_eq!(lx.scan_next_token().unwrap(), symbol);
        }
    }

    #[test]
    fn stream_keyword_eol_handling() {
        let mut lx = lexer(b"stream\nAB");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::BeginStream);
        assert_eq!(lx.read_stream(2).unwrap(), b"AB");

        let mut lx = lexer(b"stream\r\nAB");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::BeginStream);
        assert_eq!(lx.read_stream(2).unwrap(), b"AB");

        // A bare CR stays in place for the parser to reject.
        let mut lx = lexer(b"stream\rAB");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::BeginStream);
        assert!(lx.at_bare_carriage_return().unwrap());
    }

    #[test]
    fn whitespace_includes_legacy_bytes() {
        let mut lx = lexer(b"\x0B\xAD 7");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Integer);
        assert_eq!(lx.token_i32().unwrap(), 7);
    }

    #[test]
    fn comments_are_tokens() {
        let mut lx = lexer(b"% a comment\n42");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Comment);
        assert_eq!(lx.token(), b" a comment");
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Integer);
    }

    #[test]
    fn window_refills_across_boundaries() {
        let mut bytes = vec![b' '; BUFFER_SIZE - 2];
        bytes.extend_from_slice(b"(spans the window boundary)");
        let mut lx = lexer(&bytes);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::String);
        assert_eq!(lx.token(), b"spans the window boundary");
    }

    #[test]
    fn set_position_rescans() {
        let mut lx = lexer(b"1 2 3");
        lx.scan_next_token().unwrap();
        lx.scan_next_token().unwrap();
        lx.set_position(0);
        assert_eq!(lx.scan_next_token().unwrap(), Symbol::Integer);
        assert_eq!(lx.token_i32().unwrap(), 1);
    }
}
