//! Cross-reference streams (PDF 1.5), the stream-form replacement for the
//! classic `xref` table.

use crate::xref::{CrossReferenceTable, XrefEntry};
use crate::{dictionary, filters, Dictionary, Error, Object, Result, Stream};
use crate::error::XrefError;
use std::io::{Cursor, Read};
use std::sync::Mutex;

/// Entry of a cross-reference stream, semantics per PDF 32000-1 table 18:
/// type 0 frees a slot, type 1 records a byte position, type 2 points into
/// an object stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossReferenceStreamEntry {
    pub kind: u8,
    pub field2: u64,
    pub field3: u32,
    pub object_number: u32,
}

/// Decodes a `/Type /XRef` stream into a table and its trailer dictionary.
///
/// The returned dictionary keeps `/W` (the writer never narrows widths) and
/// the trailer keys; stream bookkeeping entries are dropped.
pub fn decode(stream: &Stream) -> Result<(CrossReferenceTable, Dictionary)> {
    let content = stream.decompressed_content()?;
    let mut dict = stream.dict.clone();

    let size = dict.get_integer(b"Size").map_err(|_| Error::Xref(XrefError::Stream))?;
    let widths = read_widths(&dict)?;
    let index = match dict.get_array(b"Index").map_err(|_| Error::Xref(XrefError::Stream))? {
        Some(ranges) => ranges
            .iter()
            .map(|n| n.as_i64())
            .collect::<Result<Vec<i64>>>()
            .map_err(|_| Error::Xref(XrefError::Stream))?,
        None => vec![0, size],
    };

    let mut xref = CrossReferenceTable::new();
    let mut reader = Cursor::new(content);
    let mut bytes1 = vec![0_u8; widths[0]];
    let mut bytes2 = vec![0_u8; widths[1]];
    let mut bytes3 = vec![0_u8; widths[2]];

    for range in index.chunks(2) {
        let &[start, count] = range else {
            return Err(Error::Xref(XrefError::Stream));
        };
        for j in 0..count {
            let kind = if bytes1.is_empty() {
                // A zero-width type field defaults to type 1.
                1
            } else {
                read_big_endian_integer(&mut reader, bytes1.as_mut_slice())?
            };
            let number = u32::try_from(start + j).map_err(|_| Error::Xref(XrefError::Stream))?;
            match kind {
                0 => {
                    read_big_endian_integer(&mut reader, bytes2.as_mut_slice())?;
                    read_big_endian_integer(&mut reader, bytes3.as_mut_slice())?;
                }
                1 => {
                    let offset = read_big_endian_integer(&mut reader, bytes2.as_mut_slice())?;
                    let generation = if bytes3.is_empty() {
                        0
                    } else {
                        read_big_endian_integer(&mut reader, bytes3.as_mut_slice())? as u16
                    };
                    xref.replace((number, generation), XrefEntry::Normal { offset, generation });
                }
                2 => {
                    let container = read_big_endian_integer(&mut reader, bytes2.as_mut_slice())? as u32;
                    let index = read_big_endian_integer(&mut reader, bytes3.as_mut_slice())? as u16;
                    xref.replace((number, 0), XrefEntry::Compressed { container, index });
                }
                _ => {}
            }
        }
    }
    if size > 0 {
        xref.ensure_max(size as u32 - 1);
    }

    dict.remove(b"Length");
    dict.remove(b"Filter");
    dict.remove(b"DecodeParms");
    dict.remove(b"Index");
    dict.remove(b"Type");
    Ok((xref, dict))
}

pub(crate) fn read_widths(dict: &Dictionary) -> Result<[usize; 3]> {
    let w = dict
        .get_array(b"W")
        .ok()
        .flatten()
        .ok_or(Error::Xref(XrefError::StreamWidths))?;
    if w.len() < 3 {
        return Err(Error::Xref(XrefError::StreamWidths));
    }
    let mut widths = [0usize; 3];
    for (slot, value) in widths.iter_mut().zip(w) {
        let n = value.as_i64().map_err(|_| Error::Xref(XrefError::StreamWidths))?;
        if !(0..=8).contains(&n) {
            return Err(Error::Xref(XrefError::StreamWidths));
        }
        *slot = n as usize;
    }
    Ok(widths)
}

fn read_big_endian_integer(reader: &mut Cursor<Vec<u8>>, buffer: &mut [u8]) -> Result<u64> {
    reader
        .read_exact(buffer)
        .map_err(|_| Error::Xref(XrefError::Stream))?;
    let mut value = 0u64;
    for &byte in buffer.iter() {
        value = (value << 8) + u64::from(byte);
    }
    Ok(value)
}

fn bytes_needed(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros() as usize).div_ceil(8)
    }
}

/// Builds the cross-reference stream of one save.
///
/// Appends are mutex-guarded in case a caller shares the document across
/// threads during construction; emission itself is single-threaded.
pub(crate) struct CrossReferenceStreamWriter {
    entries: Mutex<Vec<CrossReferenceStreamEntry>>,
    width_floor: [usize; 3],
}

impl CrossReferenceStreamWriter {
    /// `width_floor` carries the widths of previously parsed or written
    /// cross-reference streams of this document; widths never narrow.
    pub fn new(width_floor: [usize; 3]) -> CrossReferenceStreamWriter {
        CrossReferenceStreamWriter {
            entries: Mutex::new(Vec::new()),
            width_floor: [
                width_floor[0].max(1),
                width_floor[1].max(1),
                width_floor[2].max(2),
            ],
        }
    }

    fn push(&self, entry: CrossReferenceStreamEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn add_free(&self, object_number: u32, next_free: u32, generation: u16) {
        self.push(CrossReferenceStreamEntry {
            kind: 0,
            field2: u64::from(next_free),
            field3: u32::from(generation),
            object_number,
        });
    }

    pub fn add_normal(&self, object_number: u32, offset: u64, generation: u16) {
        self.push(CrossReferenceStreamEntry {
            kind: 1,
            field2: offset,
            field3: u32::from(generation),
            object_number,
        });
    }

    pub fn add_compressed(&self, object_number: u32, container: u32, index: u16) {
        self.push(CrossReferenceStreamEntry {
            kind: 2,
            field2: u64::from(container),
            field3: u32::from(index),
            object_number,
        });
    }

    /// Serializes the entries into a ready-to-write `/Type /XRef` stream.
    ///
    /// `trailer` contributes the document keys (/Root, /Info, /ID, /Prev);
    /// `max_object_number` sets /Size. Returns the stream and the widths
    /// actually used, which become the document's new floor.
    pub fn finish(self, trailer: &Dictionary, max_object_number: u32) -> Result<(Stream, [usize; 3])> {
        let mut entries = self.entries.into_inner().unwrap();

        let has_prev = trailer.has(b"Prev");
        let min_number = entries.iter().map(|e| e.object_number).min().unwrap_or(0);
        if !has_prev && min_number >= 1 {
            // Implicit head of the free list.
            entries.push(CrossReferenceStreamEntry {
                kind: 0,
                field2: 0,
                field3: 65535,
                object_number: 0,
            });
        }
        entries.sort_by_key(|entry| entry.object_number);

        let max_field2 = entries.iter().map(|e| e.field2).max().unwrap_or(0);
        if bytes_needed(max_field2) > 4 {
            return Err(Error::WidthOverflow);
        }
        let max_field3 = entries.iter().map(|e| u64::from(e.field3)).max().unwrap_or(0);
        let widths = [
            self.width_floor[0],
            self.width_floor[1].max(bytes_needed(max_field2)),
            self.width_floor[2].max(bytes_needed(max_field3)),
        ];

        let columns: usize = widths.iter().sum();
        let mut rows = Vec::with_capacity(entries.len() * columns);
        for entry in &entries {
            write_big_endian_integer(&mut rows, u64::from(entry.kind), widths[0]);
            write_big_endian_integer(&mut rows, entry.field2, widths[1]);
            write_big_endian_integer(&mut rows, u64::from(entry.field3), widths[2]);
        }
        let predicted = filters::png::encode_frame(&rows, 1, columns);

        let mut dict = dictionary! {
            "Type" => Object::Name(b"XRef".to_vec()),
            "Size" => i64::from(max_object_number) + 1,
            "W" => vec![
                Object::Integer(widths[0] as i32),
                Object::Integer(widths[1] as i32),
                Object::Integer(widths[2] as i32),
            ],
            "Index" => build_index(&entries),
            "Filter" => Object::Name(b"FlateDecode".to_vec()),
            "DecodeParms" => dictionary! {
                "Columns" => columns as i64,
                "Predictor" => 12,
            },
        };
        for key in [b"Root".as_slice(), b"Info", b"ID", b"Prev", b"Encrypt"] {
            if let Ok(value) = trailer.get(key) {
                dict.set(key, value.clone());
            }
        }

        let mut stream = Stream::new(dict, predicted).with_compression(false);
        stream_deflate(&mut stream)?;
        Ok((stream, widths))
    }
}

/// Groups consecutive object numbers into `[first count …]` runs.
fn build_index(entries: &[CrossReferenceStreamEntry]) -> Vec<Object> {
    let mut index = Vec::new();
    let mut iter = entries.iter().map(|e| e.object_number);
    let Some(first) = iter.next() else {
        return index;
    };
    let mut run_start = first;
    let mut run_len: i64 = 1;
    let mut prev = first;
    for number in iter {
        if number == prev + 1 {
            run_len += 1;
        } else {
            index.push(Object::integer(i64::from(run_start)));
            index.push(Object::integer(run_len));
            run_start = number;
            run_len = 1;
        }
        prev = number;
    }
    index.push(Object::integer(i64::from(run_start)));
    index.push(Object::integer(run_len));
    index
}

fn write_big_endian_integer(out: &mut Vec<u8>, value: u64, width: usize) {
    for i in (0..width).rev() {
        out.push((value >> (i * 8)) as u8);
    }
}

/// FlateDecode is already named in the dictionary; only the bytes are
/// compressed here.
fn stream_deflate(stream: &mut Stream) -> Result<()> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&stream.content)?;
    stream.set_content(encoder.finish()?);
    Ok(())
}
