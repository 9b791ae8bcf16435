//! Object streams (PDF 1.5): containers packing several non-stream objects
//! into one compressed stream.

use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::{dictionary, Error, Object, ObjectId, Result, Stream};
use std::io::Cursor;
use std::sync::Mutex;

const CHECKSUM_MODULUS: u64 = 65521;

/// Length-suffixed Adler-style checksum of a serialized object, used to
/// detect modified objects when writing an incremental update. The byte sum
/// fills both 16-bit halves; the low 32 bits carry the length so equal sums
/// over different lengths stay distinct. The empty input hashes to 0.
pub fn calc_checksum(data: &[u8]) -> u64 {
    if data.is_empty() {
        return 0;
    }
    let sum = data.iter().fold(0u64, |acc, &byte| (acc + u64::from(byte)) % CHECKSUM_MODULUS);
    ((sum << 16 | sum) << 32) | (data.len() as u64 & 0xFFFF_FFFF)
}

/// A parsed `/Type /ObjStm` container.
#[derive(Debug)]
pub struct ObjectStream {
    /// `(object number, offset within the decoded payload)` pairs in header
    /// order. A member's position in this list is what type-2 entries index.
    pub header: Vec<(u32, usize)>,
    /// Members in header order. Generation numbers are always 0.
    pub objects: Vec<(ObjectId, Object)>,
    /// Object number of the stream this one extends.
    pub extends: Option<u32>,
}

impl ObjectStream {
    pub fn parse(stream: &Stream) -> Result<ObjectStream> {
        let content = if stream.is_compressed() {
            stream.decompressed_content()?
        } else {
            stream.content.clone()
        };
        let extends = stream.dict.get_reference(b"Extends")?.map(|id| id.0);
        if content.is_empty() {
            return Ok(ObjectStream {
                header: Vec::new(),
                objects: Vec::new(),
                extends,
            });
        }

        let count = stream.dict.get_integer(b"N")? as usize;
        let first = stream.dict.get_integer(b"First")? as usize;
        let header_block = content.get(..first).ok_or(Error::StreamLength)?;
        let header_text = std::str::from_utf8(header_block).map_err(|_| Error::Syntax {
            offset: 0,
            message: "object stream header is not ascii".to_string(),
        })?;

        let numbers: Vec<usize> = header_text
            .split_whitespace()
            .filter_map(|number| number.parse().ok())
            .collect();
        let mut header = Vec::with_capacity(count);
        for pair in numbers.chunks(2).take(count) {
            let &[number, offset] = pair else { break };
            header.push((number as u32, offset));
        }

        let mut parser = Parser::new(Lexer::new(Cursor::new(content.as_slice()))?);
        let mut objects = Vec::with_capacity(header.len());
        for &(number, offset) in &header {
            parser.set_position((first + offset) as u64);
            let object = parser.read_object()?;
            objects.push(((number, 0), object));
        }

        Ok(ObjectStream {
            header,
            objects,
            extends,
        })
    }

    /// Member at `index`, the position type-2 entries refer to.
    pub fn get(&self, index: usize) -> Option<&(ObjectId, Object)> {
        self.objects.get(index)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Accumulates serialized members for one container written on save.
///
/// Header appends are mutex-guarded in case a caller shares the document
/// across threads during programmatic construction.
pub(crate) struct ObjectStreamWriter {
    pub id: ObjectId,
    header: Mutex<Vec<(u32, Vec<u8>)>>,
    pub extends: Option<u32>,
    capacity: usize,
}

impl ObjectStreamWriter {
    pub fn new(id: ObjectId, extends: Option<u32>, capacity: usize) -> ObjectStreamWriter {
        ObjectStreamWriter {
            id,
            header: Mutex::new(Vec::new()),
            extends,
            capacity,
        }
    }

    /// Appends a serialized member and returns its index.
    pub fn push(&self, number: u32, bytes: Vec<u8>) -> usize {
        let mut header = self.header.lock().unwrap();
        header.push((number, bytes));
        header.len() - 1
    }

    pub fn len(&self) -> usize {
        self.header.lock().unwrap().len()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Builds the `/Type /ObjStm` stream: the `"N₁ off₁ N₂ off₂ …"` prefix,
    /// `/First` pointing past it, members concatenated, FlateDecode applied.
    pub fn finish(self) -> Result<Stream> {
        let members = self.header.into_inner().unwrap();

        let mut prefix = Vec::new();
        let mut payload = Vec::new();
        for (number, bytes) in &members {
            let mut buffer = itoa::Buffer::new();
            prefix.extend_from_slice(buffer.format(*number).as_bytes());
            prefix.push(b' ');
            prefix.extend_from_slice(buffer.format(payload.len()).as_bytes());
            prefix.push(b' ');
            payload.extend_from_slice(bytes);
            payload.push(b'\n');
        }

        let mut dict = dictionary! {
            "Type" => Object::Name(b"ObjStm".to_vec()),
            "N" => members.len() as i64,
            "First" => prefix.len() as i64,
        };
        if let Some(extends) = self.extends {
            dict.set("Extends", Object::Reference((extends, 0)));
        }

        let mut content = prefix;
        content.append(&mut payload);
        let mut stream = Stream::new(dict, content).with_compression(false);
        stream.compress()?;
        Ok(stream)
    }
}

/// Hands compressible objects to the current viable stream, rolling to a new
/// container at capacity. The viable-stream slot is allocated lazily under a
/// mutex.
pub(crate) struct ObjectStreamAllocator {
    streams: Mutex<Vec<ObjectStreamWriter>>,
    capacity: usize,
}

impl ObjectStreamAllocator {
    pub fn new(capacity: usize) -> ObjectStreamAllocator {
        ObjectStreamAllocator {
            streams: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Places one serialized object; returns `(container number, index)`.
    ///
    /// A full viable stream is replaced by a fresh one whose `/Extends`
    /// points at the chain's root: the previous stream's `/Extends` when
    /// present, the previous stream itself otherwise.
    pub fn push<F: FnMut() -> ObjectId>(&self, number: u32, bytes: Vec<u8>, mut new_id: F) -> (u32, u16) {
        let mut streams = self.streams.lock().unwrap();
        let roll = match streams.last() {
            None => true,
            Some(stream) => stream.is_full(),
        };
        if roll {
            let extends = streams.last().map(|prev| prev.extends.unwrap_or(prev.id.0));
            streams.push(ObjectStreamWriter::new(new_id(), extends, self.capacity));
        }
        let stream = streams.last().unwrap();
        let index = stream.push(number, bytes);
        (stream.id.0, index as u16)
    }

    pub fn into_streams(self) -> Vec<ObjectStreamWriter> {
        self.streams.into_inner().unwrap()
    }
}
