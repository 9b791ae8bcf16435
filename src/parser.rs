use crate::lexer::{Lexer, Symbol};
use crate::xref::{CrossReferenceTable, XrefEntry};
use crate::{Dictionary, Error, HexCase, Object, ObjectId, Result, Stream, StringEncoding};
use std::collections::VecDeque;
use std::io::{Read, Seek};
use std::str::FromStr;

/// Resolves an object id to the byte offset of its `n g obj` header. Used
/// when a stream's `/Length` is an indirect reference.
pub type OffsetLookup<'a> = dyn Fn(ObjectId) -> Option<u64> + 'a;

pub(crate) fn no_lookup(_: ObjectId) -> Option<u64> {
    None
}

/// One scanned token with the lexer state it was produced under.
#[derive(Debug, Clone)]
struct Token {
    symbol: Symbol,
    bytes: Vec<u8>,
    offset: u64,
    bool_value: bool,
    hex_case: HexCase,
    encoding: StringEncoding,
}

impl Token {
    fn parse<T: FromStr>(&self, expected: &'static str) -> Result<T> {
        std::str::from_utf8(&self.bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Syntax {
                offset: self.offset,
                message: format!("expected {}", expected),
            })
    }
}

/// Assembles objects, cross-reference sections and trailers from the token
/// stream of a [`Lexer`].
pub struct Parser<R: Read + Seek> {
    lexer: Lexer<R>,
    lookahead: VecDeque<Token>,
}

impl<R: Read + Seek> Parser<R> {
    pub fn new(lexer: Lexer<R>) -> Parser<R> {
        Parser {
            lexer,
            lookahead: VecDeque::new(),
        }
    }

    pub fn into_lexer(self) -> Lexer<R> {
        self.lexer
    }

    pub fn position(&self) -> u64 {
        match self.lookahead.front() {
            Some(token) => token.offset,
            None => self.lexer.position(),
        }
    }

    pub fn set_position(&mut self, position: u64) {
        self.lookahead.clear();
        self.lexer.set_position(position);
    }

    /// Scans one token, skipping comments.
    fn scan(&mut self) -> Result<Token> {
        loop {
            let offset = self.lexer.position();
            let symbol = self.lexer.scan_next_token()?;
            if symbol == Symbol::Comment {
                continue;
            }
            return Ok(Token {
                symbol,
                bytes: self.lexer.token().to_vec(),
                offset,
                bool_value: self.lexer.bool_value(),
                hex_case: self.lexer.hex_case(),
                encoding: self.lexer.string_encoding(),
            });
        }
    }

    fn next(&mut self) -> Result<Token> {
        match self.lookahead.pop_front() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    fn peek(&mut self, index: usize) -> Result<&Token> {
        while self.lookahead.len() <= index {
            let token = self.scan()?;
            self.lookahead.push_back(token);
        }
        Ok(&self.lookahead[index])
    }

    fn expect(&mut self, symbol: Symbol) -> Result<Token> {
        let token = self.next()?;
        if token.symbol != symbol {
            return Err(Error::UnexpectedSymbol {
                found: token.symbol.name(),
                offset: token.offset,
            });
        }
        Ok(token)
    }

    /// Reads any direct object. Streams are rejected here; they only occur
    /// as the body of an indirect object.
    pub fn read_object(&mut self) -> Result<Object> {
        self.read_object_with(&no_lookup)
    }

    pub fn read_object_with(&mut self, lookup: &OffsetLookup) -> Result<Object> {
        let token = self.next()?;
        self.read_object_from(token, lookup)
    }

    fn read_object_from(&mut self, token: Token, lookup: &OffsetLookup) -> Result<Object> {
        match token.symbol {
            Symbol::Null => Ok(Object::Null),
            Symbol::Boolean => Ok(Object::Boolean(token.bool_value)),
            Symbol::Integer | Symbol::UInteger => {
                if let Some(id) = self.try_reference(&token)? {
                    return Ok(Object::Reference(id));
                }
                match token.symbol {
                    Symbol::Integer => Ok(Object::Integer(token.parse("integer")?)),
                    _ => Ok(Object::UInteger(token.parse("unsigned integer")?)),
                }
            }
            Symbol::Real => Ok(Object::Real(token.parse("real")?)),
            Symbol::Name => Ok(Object::Name(token.bytes)),
            Symbol::String | Symbol::UnicodeString => Ok(Object::String(token.bytes, token.encoding)),
            Symbol::HexString | Symbol::UnicodeHexString => Ok(Object::HexString(token.bytes, token.hex_case)),
            Symbol::BeginArray => {
                let mut array = Vec::new();
                loop {
                    if self.peek(0)?.symbol == Symbol::EndArray {
                        self.next()?;
                        break;
                    }
                    let item = self.read_object_with(lookup)?;
                    array.push(item);
                }
                Ok(Object::Array(array))
            }
            Symbol::BeginDictionary => {
                let dict = self.read_dictionary_body(lookup)?;
                if self.peek(0)?.symbol == Symbol::BeginStream {
                    self.next()?;
                    let stream = self.read_stream_payload(dict, lookup)?;
                    return Ok(Object::Stream(stream));
                }
                Ok(Object::Dictionary(dict))
            }
            _ => Err(Error::UnexpectedSymbol {
                found: token.symbol.name(),
                offset: token.offset,
            }),
        }
    }

    /// `n g R` lookahead after an integer token.
    fn try_reference(&mut self, token: &Token) -> Result<Option<ObjectId>> {
        let next_is_number = matches!(self.peek(0)?.symbol, Symbol::Integer | Symbol::UInteger);
        if !next_is_number || self.peek(1)?.symbol != Symbol::R {
            return Ok(None);
        }
        let Some(number) = std::str::from_utf8(&token.bytes).ok().and_then(|s| s.parse::<u32>().ok()) else {
            return Ok(None);
        };
        let Some(generation) = std::str::from_utf8(&self.peek(0)?.bytes)
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        else {
            return Ok(None);
        };
        self.next()?;
        self.next()?;
        Ok(Some((number, generation)))
    }

    /// The first parsed value of a repeated key wins.
    fn read_dictionary_body(&mut self, lookup: &OffsetLookup) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let token = self.next()?;
            match token.symbol {
                Symbol::EndDictionary => break,
                Symbol::Name => {
                    let value = self.read_object_with(lookup)?;
                    if !dict.has(&token.bytes) {
                        dict.set(token.bytes, value);
                    }
                }
                _ => {
                    return Err(Error::UnexpectedSymbol {
                        found: token.symbol.name(),
                        offset: token.offset,
                    })
                }
            }
        }
        Ok(dict)
    }

    fn read_stream_payload(&mut self, dict: Dictionary, lookup: &OffsetLookup) -> Result<Stream> {
        if self.lexer.at_bare_carriage_return()? {
            return Err(self.lexer.syntax_error("stream keyword must be followed by LF or CR LF"));
        }
        let start = self.lexer.position();
        let length = match dict.get(b"Length") {
            Ok(Object::Reference(id)) => {
                let offset = lookup(*id).ok_or(Error::StreamLength)?;
                self.read_indirect_integer_at(offset)?
            }
            Ok(value) => value.as_i64()?,
            Err(_) => return Err(Error::StreamLength),
        };
        let length = usize::try_from(length).map_err(|_| Error::StreamLength)?;

        let content = self.lexer.read_stream(length)?;
        let token = self.next()?;
        if token.symbol != Symbol::EndStream {
            return Err(Error::StreamLength);
        }
        let mut stream = Stream::new(dict, content);
        stream.start_position = Some(start);
        Ok(stream)
    }

    /// Parses `n g obj <integer> endobj` at `offset` and restores the
    /// current position afterwards.
    fn read_indirect_integer_at(&mut self, offset: u64) -> Result<i64> {
        let saved = self.position();
        self.set_position(offset);
        let result = (|| {
            self.expect_number()?;
            self.expect_number()?;
            self.expect(Symbol::Obj)?;
            let token = self.expect_number()?;
            token.parse("integer")
        })();
        self.set_position(saved);
        result
    }

    /// Also admits `Real` tokens: integers past 32 bits degrade to `Real`,
    /// and byte offsets in very large files are exactly that. The numeric
    /// parse of the caller still rejects anything with a decimal point.
    fn expect_number(&mut self) -> Result<Token> {
        let token = self.next()?;
        match token.symbol {
            Symbol::Integer | Symbol::UInteger | Symbol::Real => Ok(token),
            _ => Err(Error::UnexpectedSymbol {
                found: token.symbol.name(),
                offset: token.offset,
            }),
        }
    }

    /// Parses a complete `n g obj … endobj` at `offset`.
    pub fn read_indirect_object(
        &mut self, offset: u64, expected_id: Option<ObjectId>, lookup: &OffsetLookup,
    ) -> Result<(ObjectId, Object)> {
        self.set_position(offset);

        let number: u32 = self
            .expect_number()
            .and_then(|t| t.parse("object number"))
            .map_err(|_| Error::IndirectObject { offset })?;
        let generation: u16 = self
            .expect_number()
            .and_then(|t| t.parse("generation"))
            .map_err(|_| Error::IndirectObject { offset })?;
        self.expect(Symbol::Obj).map_err(|_| Error::IndirectObject { offset })?;

        let id = (number, generation);
        if let Some(expected_id) = expected_id {
            if id != expected_id {
                return Err(Error::ObjectIdMismatch);
            }
        }

        let object = self.read_object_with(lookup)?;
        if self.peek(0)?.symbol == Symbol::EndObj {
            self.next()?;
        }
        Ok((id, object))
    }

    /// Reads the cross-reference section at the current position: either a
    /// classic `xref` table with its `trailer`, or a cross-reference stream.
    pub fn read_cross_reference_section(
        &mut self, lookup: &OffsetLookup,
    ) -> Result<(CrossReferenceTable, Dictionary, crate::TrailerKind)> {
        if self.peek(0)?.symbol == Symbol::XRef {
            let (xref, trailer) = self.read_classic_xref()?;
            return Ok((xref, trailer, crate::TrailerKind::Classic));
        }

        let offset = self.position();
        let (id, object) = self.read_indirect_object(offset, None, lookup)?;
        let stream = match object {
            Object::Stream(ref stream) if stream.dict.type_is(b"XRef") => stream,
            _ => return Err(Error::Xref(crate::error::XrefError::Parse)),
        };
        let (mut xref, trailer) = crate::xref_stream::decode(stream)?;
        xref.ensure_max(id.0);
        Ok((xref, trailer, crate::TrailerKind::CrossReferenceStream))
    }

    /// Subsections of `first count` headers followed by fixed-width entries.
    fn read_classic_xref(&mut self) -> Result<(CrossReferenceTable, Dictionary)> {
        self.expect(Symbol::XRef)?;
        let mut xref = CrossReferenceTable::new();
        loop {
            let token = self.next()?;
            match token.symbol {
                Symbol::Integer | Symbol::UInteger => {
                    let first: u32 = token.parse("subsection start")?;
                    let count: u32 = self.expect_number()?.parse("subsection count")?;
                    for index in 0..count {
                        let offset: u64 = self.expect_number()?.parse("entry offset")?;
                        let generation: u16 = self.expect_number()?.parse("entry generation")?;
                        let kind = self.next()?;
                        let number = first + index;
                        match (kind.symbol, kind.bytes.as_slice()) {
                            (Symbol::Keyword, b"n") => {
                                xref.add((number, generation), XrefEntry::Normal { offset, generation })?;
                            }
                            (Symbol::Keyword, b"f") => {
                                // Free slots are not registered; the head of
                                // the free list is implicit.
                            }
                            _ => {
                                return Err(Error::UnexpectedSymbol {
                                    found: kind.symbol.name(),
                                    offset: kind.offset,
                                })
                            }
                        }
                    }
                }
                Symbol::Trailer => {
                    self.expect(Symbol::BeginDictionary)?;
                    let trailer = self.read_dictionary_body(&no_lookup)?;
                    let size = trailer.get_integer(b"Size").map_err(|_| Error::Trailer)?;
                    if size > 0 {
                        xref.ensure_max(size as u32 - 1);
                    }
                    return Ok((xref, trailer));
                }
                _ => {
                    return Err(Error::UnexpectedSymbol {
                        found: token.symbol.name(),
                        offset: token.offset,
                    })
                }
            }
        }
    }

    /// Reads the `startxref` tail at the current position.
    pub fn read_startxref(&mut self) -> Result<u64> {
        self.expect(Symbol::StartXRef).map_err(|_| Error::Xref(crate::error::XrefError::Start))?;
        self.expect_number()?
            .parse("startxref offset")
            .map_err(|_| Error::Xref(crate::error::XrefError::Start))
    }
}
