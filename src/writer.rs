use crate::object_stream::{calc_checksum, ObjectStreamAllocator};
use crate::trailer::{Trailer, TrailerKind};
use crate::xref::{CrossReferenceTable, XrefEntry};
use crate::xref_stream::CrossReferenceStreamWriter;
use crate::{
    Dictionary, Document, Error, HexCase, Object, ObjectId, Result, SaveOptions, Stream, StringEncoding,
};
use log::warn;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

impl Document {
    /// Save PDF document to specified file path.
    #[inline]
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<File> {
        let mut file = BufWriter::new(File::create(path)?);
        self.save_internal(&mut file, &SaveOptions::default())?;
        file.into_inner().map_err(|err| Error::Io(err.into_error()))
    }

    /// Save PDF to arbitrary target with default options.
    #[inline]
    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.save_internal(target, &SaveOptions::default())
    }

    pub fn save_with_options<W: Write>(&mut self, target: &mut W, options: SaveOptions) -> Result<()> {
        self.save_internal(target, &options)
    }

    fn save_internal<W: Write>(&mut self, target: &mut W, options: &SaveOptions) -> Result<()> {
        if self.is_read_only() || self.has_signature() {
            // Signed byte ranges must survive verbatim.
            if let Some(bytes) = &self.original_bytes {
                target.write_all(bytes)?;
                return Ok(());
            }
        }
        if options.renumber {
            self.fix_xrefs(true);
            self.renumber()?;
        }
        self.prepare_for_save();
        if let Some(handler) = self.security_handler.clone() {
            handler.encrypt_document(self)?;
        }

        let mut target = CountingWrite {
            inner: target,
            bytes_written: 0,
        };
        writeln!(target, "%PDF-{}", self.version)?;

        let mut positions = CrossReferenceTable::new();
        let mut compressed: Vec<(ObjectId, u32, u16)> = Vec::new();
        let encrypt_ref = self.trailer().get_reference(b"Encrypt").ok().flatten();

        if options.use_object_streams {
            let allocator = ObjectStreamAllocator::new(options.object_stream_config.max_objects_per_stream);
            let mut next_number = self.max_id();
            let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
            for id in ids {
                let object = &self.objects[&id];
                if skip_on_save(object) {
                    continue;
                }
                if is_compressible(id, object, encrypt_ref) {
                    let mut bytes = Vec::new();
                    Writer::write_object(&mut bytes, object)?;
                    let (container, index) = allocator.push(id.0, bytes, || {
                        next_number += 1;
                        (next_number, 0)
                    });
                    compressed.push((id, container, index));
                } else {
                    Writer::write_indirect_object(&mut target, id, object, &mut positions)?;
                }
            }
            for stream_writer in allocator.into_streams() {
                let id = stream_writer.id;
                let stream = stream_writer.finish()?;
                Writer::write_indirect_object(&mut target, id, &Object::Stream(stream), &mut positions)?;
            }
            self.reference_table.ensure_max(next_number);
        } else {
            for (&id, object) in &self.objects {
                if skip_on_save(object) {
                    continue;
                }
                Writer::write_indirect_object(&mut target, id, object, &mut positions)?;
            }
        }

        let xref_start = target.bytes_written as u64;
        if options.use_xref_streams {
            self.write_xref_stream(&mut target, positions, &compressed, None)?;
        } else {
            Writer::write_xref(&mut target, &positions, true)?;
            let trailer = build_trailer_dict(self, self.max_id(), None);
            target.write_all(b"trailer\n")?;
            Writer::write_dictionary(&mut target, &trailer)?;
            target.write_all(b"\n")?;
        }
        write!(target, "startxref\n{}\n%%EOF\n", xref_start)?;
        Ok(())
    }

    /// Appends one update generation after the original bytes: changed and
    /// new objects, a cross-reference section pointing back via `/Prev`.
    pub fn save_incremental<W: Write>(&mut self, target: &mut W, options: SaveOptions) -> Result<()> {
        let Some(original) = self.original_bytes.clone() else {
            warn!("document has no original bytes; writing a full save instead");
            return self.save_internal(target, &options);
        };
        if self.is_read_only() || self.has_signature() {
            target.write_all(&original)?;
            return Ok(());
        }
        self.prepare_for_save();
        if let Some(handler) = self.security_handler.clone() {
            handler.encrypt_document(self)?;
        }

        let mut appended: Vec<u8> = Vec::new();
        let mut counting = CountingWrite {
            inner: &mut appended,
            bytes_written: original.len(),
        };
        if original.last() != Some(&b'\n') {
            counting.write_all(b"\n")?;
        }

        let mut changed: Vec<ObjectId> = Vec::new();
        for (&id, object) in &self.objects {
            if skip_on_save(object) {
                continue;
            }
            let mut bytes = Vec::new();
            Writer::write_object(&mut bytes, object)?;
            if self.checksums.get(&id) == Some(&calc_checksum(&bytes)) {
                continue;
            }
            changed.push(id);
        }

        let mut positions = CrossReferenceTable::new();
        for &id in &changed {
            Writer::write_indirect_object(&mut counting, id, &self.objects[&id], &mut positions)?;
        }

        let prev = self.last_startxref;
        let xref_start = counting.bytes_written as u64;
        let use_stream = options.use_xref_streams || self.trailers[0].kind == TrailerKind::CrossReferenceStream;
        let kind = if use_stream {
            self.write_xref_stream(&mut counting, positions.clone(), &[], Some(prev))?;
            TrailerKind::CrossReferenceStream
        } else {
            Writer::write_xref(&mut counting, &positions, false)?;
            let trailer = build_trailer_dict(self, self.max_id(), Some(prev));
            counting.write_all(b"trailer\n")?;
            Writer::write_dictionary(&mut counting, &trailer)?;
            counting.write_all(b"\n")?;
            TrailerKind::Classic
        };
        write!(counting, "startxref\n{}\n%%EOF\n", xref_start)?;

        target.write_all(&original)?;
        target.write_all(&appended)?;

        // The update generation becomes the head of the chain.
        let dict = build_trailer_dict(self, self.max_id(), Some(prev));
        for (id, entry) in positions.iter() {
            self.reference_table.replace(*id, *entry);
        }
        self.trailers.insert(0, Trailer::new(dict, kind, positions, xref_start));
        self.last_startxref = xref_start;
        let mut full = original;
        full.extend_from_slice(&appended);
        self.original_bytes = Some(full);
        self.record_checksums();
        Ok(())
    }

    /// Walks all indirect objects before positioning so dependent byte
    /// content is materialized.
    fn prepare_for_save(&mut self) {
        for object in self.objects.values_mut() {
            if let Object::Stream(stream) = object {
                let length = stream.content.len() as i64;
                stream.dict.set("Length", length);
            }
        }
    }

    fn write_xref_stream<W: Write>(
        &mut self, target: &mut CountingWrite<&mut W>, positions: CrossReferenceTable,
        compressed: &[(ObjectId, u32, u16)], prev: Option<u64>,
    ) -> Result<()> {
        let writer = CrossReferenceStreamWriter::new(self.xref_stream_widths);
        for (id, entry) in positions.iter() {
            if let XrefEntry::Normal { offset, generation } = entry {
                writer.add_normal(id.0, *offset, *generation);
            }
        }
        for &(id, container, index) in compressed {
            writer.add_compressed(id.0, container, index);
        }
        let xref_id = self.reference_table.allocate();
        writer.add_normal(xref_id.0, target.bytes_written as u64, 0);

        let trailer = build_trailer_dict(self, self.max_id(), prev);
        let (stream, widths) = writer.finish(&trailer, self.max_id())?;
        self.xref_stream_widths = widths;

        let mut scratch = CrossReferenceTable::new();
        Writer::write_indirect_object(target, xref_id, &Object::Stream(stream), &mut scratch)?;
        Ok(())
    }
}

/// Regenerated containers never reach the output directly.
fn skip_on_save(object: &Object) -> bool {
    match object.type_name() {
        Ok(name) => [b"ObjStm".as_slice(), b"XRef", b"Linearized"].contains(&name),
        Err(_) => false,
    }
}

/// Stream objects keep type-1 entries; members of object streams must have
/// generation 0, and the encryption dictionary stays top-level.
fn is_compressible(id: ObjectId, object: &Object, encrypt: Option<ObjectId>) -> bool {
    !matches!(object, Object::Stream(_)) && id.1 == 0 && encrypt != Some(id)
}

fn build_trailer_dict(document: &Document, max_object_number: u32, prev: Option<u64>) -> Dictionary {
    const EXCLUDE: [&[u8]; 9] = [
        b"Size",
        b"Prev",
        b"W",
        b"Index",
        b"Filter",
        b"DecodeParms",
        b"Length",
        b"Type",
        b"XRefStm",
    ];
    let mut dict = Dictionary::new();
    dict.set("Size", i64::from(max_object_number) + 1);
    for (key, value) in document.trailer().iter() {
        if EXCLUDE.contains(&key.as_slice()) {
            continue;
        }
        dict.set(key.clone(), value.clone());
    }
    if let Some(prev) = prev {
        dict.set("Prev", prev as i64);
    }
    dict
}

pub struct Writer;

impl Writer {
    fn need_separator(object: &Object) -> bool {
        matches!(
            object,
            Object::Null
                | Object::Boolean(_)
                | Object::Integer(_)
                | Object::UInteger(_)
                | Object::Real(_)
                | Object::Reference(_)
        )
    }

    fn need_end_separator(object: &Object) -> bool {
        matches!(
            object,
            Object::Null
                | Object::Boolean(_)
                | Object::Integer(_)
                | Object::UInteger(_)
                | Object::Real(_)
                | Object::Name(_)
                | Object::Reference(_)
                | Object::Stream(_)
        )
    }

    /// Classic cross-reference table: the free-list head, then one
    /// subsection per run of contiguous object numbers. Every entry line is
    /// exactly 20 bytes.
    pub(crate) fn write_xref(file: &mut dyn Write, positions: &CrossReferenceTable, free_head: bool) -> Result<()> {
        file.write_all(b"xref\n")?;
        if free_head {
            file.write_all(b"0 1\n")?;
            Writer::write_xref_entry(file, 0, 65535, 'f')?;
        }
        let ids = positions.all_references();
        let mut index = 0;
        while index < ids.len() {
            let start = index;
            while index + 1 < ids.len() && ids[index + 1].0 == ids[index].0 + 1 {
                index += 1;
            }
            writeln!(file, "{} {}", ids[start].0, index - start + 1)?;
            for id in &ids[start..=index] {
                match positions.lookup(*id) {
                    Some(XrefEntry::Normal { offset, generation }) => {
                        Writer::write_xref_entry(file, *offset, *generation, 'n')?;
                    }
                    _ => Writer::write_xref_entry(file, 0, 65535, 'f')?,
                }
            }
            index += 1;
        }
        Ok(())
    }

    fn write_xref_entry(file: &mut dyn Write, offset: u64, generation: u16, kind: char) -> Result<()> {
        write!(file, "{:010} {:05} {}\r\n", offset, generation, kind)?;
        Ok(())
    }

    pub(crate) fn write_indirect_object<W: Write>(
        file: &mut CountingWrite<&mut W>, id: ObjectId, object: &Object, positions: &mut CrossReferenceTable,
    ) -> Result<()> {
        let offset = file.bytes_written as u64;
        positions.replace(id, XrefEntry::Normal { offset, generation: id.1 });
        write!(
            file,
            "{} {} obj{}",
            id.0,
            id.1,
            if Writer::need_separator(object) { " " } else { "" }
        )?;
        Writer::write_object(file, object)?;
        writeln!(
            file,
            "{}endobj",
            if Writer::need_end_separator(object) { " " } else { "" }
        )?;
        Ok(())
    }

    pub fn write_object(file: &mut dyn Write, object: &Object) -> Result<()> {
        match object {
            Object::Null => file.write_all(b"null")?,
            Object::Boolean(value) => {
                if *value {
                    file.write_all(b"true")?;
                } else {
                    file.write_all(b"false")?;
                }
            }
            Object::Integer(value) => {
                let mut buffer = itoa::Buffer::new();
                file.write_all(buffer.format(*value).as_bytes())?;
            }
            Object::UInteger(value) => {
                let mut buffer = itoa::Buffer::new();
                file.write_all(buffer.format(*value).as_bytes())?;
            }
            Object::Real(value) => write!(file, "{}", value)?,
            Object::Name(name) => Writer::write_name(file, name)?,
            Object::String(bytes, encoding) => Writer::write_string(file, bytes, *encoding)?,
            Object::HexString(bytes, case) => Writer::write_hex_string(file, bytes, *case)?,
            Object::Array(array) => Writer::write_array(file, array)?,
            Object::Dictionary(dict) => Writer::write_dictionary(file, dict)?,
            Object::Stream(stream) => Writer::write_stream(file, stream)?,
            Object::Reference(id) => write!(file, "{} {} R", id.0, id.1)?,
        }
        Ok(())
    }

    fn write_name(file: &mut dyn Write, name: &[u8]) -> Result<()> {
        file.write_all(b"/")?;
        for &byte in name {
            // Whitespace and delimiters are #-escaped, as is anything
            // outside 33 (!) to 126 (~).
            if b" \t\n\r\x0C()<>[]{}/%#".contains(&byte) || !(33..=126).contains(&byte) {
                write!(file, "#{:02X}", byte)?;
            } else {
                file.write_all(&[byte])?;
            }
        }
        Ok(())
    }

    /// Literal strings re-emit the byte-order mark their encoding tag was
    /// derived from; backslash, carriage return and unbalanced parentheses
    /// are escaped.
    fn write_string(file: &mut dyn Write, bytes: &[u8], encoding: StringEncoding) -> Result<()> {
        let mut text = Vec::with_capacity(bytes.len() + 2);
        match encoding {
            StringEncoding::Utf16Be => text.extend_from_slice(&[0xFE, 0xFF]),
            StringEncoding::Utf16Le => text.extend_from_slice(&[0xFF, 0xFE]),
            StringEncoding::Raw | StringEncoding::PdfDoc => {}
        }
        text.extend_from_slice(bytes);

        let mut escape_indices = Vec::new();
        let mut parentheses = Vec::new();
        for (index, &byte) in text.iter().enumerate() {
            match byte {
                b'(' => parentheses.push(index),
                b')' => {
                    if parentheses.pop().is_none() {
                        escape_indices.push(index);
                    }
                }
                b'\\' | b'\r' => escape_indices.push(index),
                _ => {}
            }
        }
        escape_indices.append(&mut parentheses);

        file.write_all(b"(")?;
        if escape_indices.is_empty() {
            file.write_all(&text)?;
        } else {
            for (index, &byte) in text.iter().enumerate() {
                if escape_indices.contains(&index) {
                    file.write_all(b"\\")?;
                    file.write_all(&[if byte == b'\r' { b'r' } else { byte }])?;
                } else {
                    file.write_all(&[byte])?;
                }
            }
        }
        file.write_all(b")")?;
        Ok(())
    }

    /// Hex strings reproduce the digit case they were scanned with.
    fn write_hex_string(file: &mut dyn Write, bytes: &[u8], case: HexCase) -> Result<()> {
        file.write_all(b"<")?;
        for &byte in bytes {
            match case {
                HexCase::Upper => write!(file, "{:02X}", byte)?,
                HexCase::Lower => write!(file, "{:02x}", byte)?,
            }
        }
        file.write_all(b">")?;
        Ok(())
    }

    fn write_array(file: &mut dyn Write, array: &[Object]) -> Result<()> {
        file.write_all(b"[")?;
        let mut first = true;
        for object in array {
            if first {
                first = false;
            } else if Writer::need_separator(object) {
                file.write_all(b" ")?;
            }
            Writer::write_object(file, object)?;
        }
        file.write_all(b"]")?;
        Ok(())
    }

    pub(crate) fn write_dictionary(file: &mut dyn Write, dictionary: &Dictionary) -> Result<()> {
        file.write_all(b"<<")?;
        for (key, value) in dictionary {
            Writer::write_name(file, key)?;
            if Writer::need_separator(value) {
                file.write_all(b" ")?;
            }
            Writer::write_object(file, value)?;
        }
        file.write_all(b">>")?;
        Ok(())
    }

    fn write_stream(file: &mut dyn Write, stream: &Stream) -> Result<()> {
        Writer::write_dictionary(file, &stream.dict)?;
        file.write_all(b"stream\n")?;
        file.write_all(&stream.content)?;
        file.write_all(b"\nendstream")?;
        Ok(())
    }
}

pub(crate) struct CountingWrite<W: Write> {
    pub(crate) inner: W,
    pub(crate) bytes_written: usize,
}

impl<W: Write> Write for CountingWrite<W> {
    #[inline]
    fn write(&mut self, buffer: &[u8]) -> std::io::Result<usize> {
        let result = self.inner.write(buffer);
        if let Ok(bytes) = result {
            self.bytes_written += bytes;
        }
        result
    }

    #[inline]
    fn write_all(&mut self, buffer: &[u8]) -> std::io::Result<()> {
        self.bytes_written += buffer.len();
        // If this fails the byte count is off, but the whole save is
        // abandoned anyway.
        self.inner.write_all(buffer)
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn write_to_vec(object: &Object) -> Vec<u8> {
        let mut out = Vec::new();
        Writer::write_object(&mut out, object).unwrap();
        out
    }

    #[test]
    fn scalars() {
        assert_eq!(write_to_vec(&Object::Null), b"null");
        assert_eq!(write_to_vec(&Object::Integer(-17)), b"-17");
        assert_eq!(write_to_vec(&Object::UInteger(2_996_984_786)), b"2996984786");
        assert_eq!(write_to_vec(&Object::Real(-0.25)), b"-0.25");
        assert_eq!(write_to_vec(&Object::Reference((7, 0))), b"7 0 R");
    }

    #[test]
    fn hex_strings_reproduce_case() {
        assert_eq!(
            write_to_vec(&Object::HexString(b"JK".to_vec(), HexCase::Upper)),
            b"<4A4B>"
        );
        assert_eq!(
            write_to_vec(&Object::HexString(b"JK".to_vec(), HexCase::Lower)),
            b"<4a4b>"
        );
    }

    #[test]
    fn unicode_strings_reemit_their_bom() {
        assert_eq!(
            write_to_vec(&Object::String(b"\x00H".to_vec(), StringEncoding::Utf16Be)),
            b"(\xFE\xFF\x00H)"
        );
        assert_eq!(
            write_to_vec(&Object::String(b"text((\r".to_vec(), StringEncoding::Raw)),
            b"(text\\(\\(\\r)"
        );
    }

    #[test]
    fn names_escape_delimiters() {
        assert_eq!(write_to_vec(&Object::Name(b"name \t".to_vec())), b"/name#20#09");
    }

    #[test]
    fn xref_subsections_preserve_gaps() {
        let mut positions = CrossReferenceTable::new();
        for number in (1..=5u32).chain(7..=9) {
            positions
                .add((number, 0), XrefEntry::Normal { offset: u64::from(number) * 100, generation: 0 })
                .unwrap();
        }
        let mut out = Vec::new();
        Writer::write_xref(&mut out, &positions, true).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("xref\n0 1\n0000000000 65535 f\r\n"));
        assert!(text.contains("1 5\n"));
        assert!(text.contains("7 3\n"));
        assert!(text.contains("0000000100 00000 n\r\n"));
        // Every entry line is exactly 20 bytes.
        for line in text.lines().filter(|line| line.len() > 6 && line.as_bytes()[0].is_ascii_digit() && line.contains(' ')) {
            if line.ends_with('n') || line.ends_with('f') {
                assert_eq!(line.len() + 2, 20, "line {:?}", line);
            }
        }
    }

    #[test]
    fn save_document_writes_a_complete_file() {
        let mut doc = Document::with_version("1.5");
        doc.add_object(Object::Null).unwrap();
        doc.add_object(Object::Boolean(true)).unwrap();
        doc.add_object(Object::Integer(3)).unwrap();
        doc.add_object(Object::Real(0.5)).unwrap();
        doc.add_object(Object::string_literal("text((\r)")).unwrap();
        doc.add_object(Object::HexString(b"text".to_vec(), HexCase::Lower)).unwrap();
        doc.add_object(Object::Name(b"name \t".to_vec())).unwrap();
        doc.add_object(Object::Reference((1, 0))).unwrap();
        doc.add_object(Stream::new(Dictionary::new(), vec![0x41, 0x42, 0x43])).unwrap();
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog" }).unwrap();
        doc.trailer_mut().set("Root", catalog);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("%PDF-1.5\n"));
        assert!(text.contains("1 0 obj"));
        assert!(text.contains("trailer"));
        assert!(text.contains("/Size 11"));
        assert!(text.ends_with("%%EOF\n"));
    }
}
