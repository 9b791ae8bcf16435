use crate::document::Linearization;
use crate::error::XrefError;
use crate::lexer::Lexer;
use crate::object_stream::ObjectStream;
use crate::parser::{no_lookup, Parser};
use crate::security::PasswordValidation;
use crate::trailer::Trailer;
use crate::xref::{CrossReferenceTable, XrefEntry};
use crate::{Document, Error, Object, ObjectId, OpenMode, Result, SecurityHandler};
use log::warn;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

/// How far from the end of the file the `startxref` keyword is searched.
const STARTXREF_WINDOW: usize = 2048;

/// Options for opening a document.
pub struct OpenOptions<'a> {
    pub mode: OpenMode,
    pub password: Vec<u8>,
    pub security_handler: Option<Arc<dyn SecurityHandler>>,
    /// Consulted when `password` does not open the document, or when
    /// `Modify` requires the owner password.
    pub password_provider: Option<&'a mut (dyn FnMut() -> Option<Vec<u8>> + 'a)>,
}

impl<'a> OpenOptions<'a> {
    pub fn new(mode: OpenMode) -> OpenOptions<'a> {
        OpenOptions {
            mode,
            password: Vec::new(),
            security_handler: None,
            password_provider: None,
        }
    }

    pub fn password<P: Into<Vec<u8>>>(mut self, password: P) -> Self {
        self.password = password.into();
        self
    }

    pub fn security_handler(mut self, handler: Arc<dyn SecurityHandler>) -> Self {
        self.security_handler = Some(handler);
        self
    }

    pub fn password_provider(mut self, provider: &'a mut (dyn FnMut() -> Option<Vec<u8>> + 'a)) -> Self {
        self.password_provider = Some(provider);
        self
    }
}

impl Document {
    /// Load PDF document from specified file path, read-only.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Document> {
        Self::open(path, OpenMode::ReadOnly)
    }

    /// Load PDF document from specified file path with an explicit mode.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Document> {
        let bytes = std::fs::read(path)?;
        Self::load_with(bytes, OpenOptions::new(mode))
    }

    /// Load PDF document from an arbitrary source, read-only.
    pub fn load_from<R: Read>(mut source: R) -> Result<Document> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        Self::load_with(bytes, OpenOptions::new(OpenMode::ReadOnly))
    }

    /// Load PDF document from bytes with full control over mode, password
    /// and security handler.
    pub fn load_with(bytes: Vec<u8>, options: OpenOptions) -> Result<Document> {
        Loader { bytes, options }.load()
    }
}

struct Loader<'a> {
    bytes: Vec<u8>,
    options: OpenOptions<'a>,
}

impl<'a> Loader<'a> {
    fn load(mut self) -> Result<Document> {
        let version = parse_header(&self.bytes)?;
        let startxref_pos = find_startxref(&self.bytes)?;

        let bytes_len = self.bytes.len() as u64;
        let mut parser = Parser::new(Lexer::new(Cursor::new(std::mem::take(&mut self.bytes)))?);
        parser.set_position(startxref_pos);
        let first_offset = parser.read_startxref()?;

        let trailers = read_trailer_chain(&mut parser, first_offset, bytes_len)?;
        let mut widths = [1usize, 1, 2];
        for trailer in &trailers {
            if let Ok(Some(w)) = trailer.dict.get_array(b"W") {
                for (slot, value) in widths.iter_mut().zip(w) {
                    if let Ok(n) = value.as_i64() {
                        *slot = (*slot).max(n as usize);
                    }
                }
            }
        }

        // Newest-wins union across the chain, remembering which trailer a
        // number first appeared in.
        let mut union = CrossReferenceTable::new();
        let mut source_trailer: BTreeMap<u32, usize> = BTreeMap::new();
        for (index, trailer) in trailers.iter().enumerate() {
            for (id, entry) in trailer.xref.iter() {
                if !union.contains_number(id.0) {
                    union.replace(*id, *entry);
                    source_trailer.insert(id.0, index);
                }
            }
            union.ensure_max(trailer.xref.max_object_number());
        }

        let handler = self.validate_encryption(&mut parser, &trailers, &union)?;

        let mut document = Document::with_version(version);
        document.open_mode = self.options.mode;
        document.trailers = trailers;
        document.security_handler = handler.clone();
        document.xref_stream_widths = widths;
        document.last_startxref = first_offset;

        read_objects(&mut parser, &mut document, &union, &source_trailer)?;
        document.reference_table = union;

        if let Some(handler) = handler {
            handler.decrypt_document(&mut document)?;
        }

        document.fix_xrefs(true);
        document.normalize_trailer_chain();
        document.record_checksums();
        document.original_bytes = Some(parser.into_lexer().into_inner().into_inner());

        if self.options.mode == OpenMode::Modify && !document.is_read_only() {
            document.regenerate_id();
            document.touch_modification_date();
        }
        Ok(document)
    }

    /// The password round demanded by an `/Encrypt` entry, run before any
    /// object decoding beyond the xref proper.
    fn validate_encryption(
        &mut self, parser: &mut Parser<Cursor<Vec<u8>>>, trailers: &[Trailer], union: &CrossReferenceTable,
    ) -> Result<Option<Arc<dyn SecurityHandler>>> {
        let encrypt = trailers.iter().find_map(|trailer| trailer.dict.get(b"Encrypt").ok());
        let Some(encrypt) = encrypt else {
            return Ok(None);
        };

        let encrypt_dict = match encrypt {
            Object::Dictionary(dict) => dict.clone(),
            Object::Reference(id) => {
                let offset = lookup_offset(union, *id).ok_or(Error::MissingObject(*id))?;
                let (_, object) = parser.read_indirect_object(offset, Some(*id), &no_lookup)?;
                object.as_dict()?.clone()
            }
            other => {
                return Err(Error::ObjectType {
                    expected: "Dictionary",
                    found: other.enum_variant(),
                })
            }
        };

        let handler = self
            .options
            .security_handler
            .clone()
            .ok_or(Error::PasswordRequired)?;

        let mut password = self.options.password.clone();
        let mut asked = false;
        loop {
            match handler.validate_password(&encrypt_dict, &password) {
                PasswordValidation::OwnerPassword => return Ok(Some(handler)),
                PasswordValidation::UserPassword => {
                    if self.options.mode != OpenMode::Modify {
                        return Ok(Some(handler));
                    }
                    // Modification needs the owner password; the provider
                    // gets one chance to supply it.
                    if asked {
                        return Err(Error::OwnerPasswordRequired);
                    }
                    match self.ask_provider() {
                        Some(next) => {
                            password = next;
                            asked = true;
                        }
                        None => return Err(Error::OwnerPasswordRequired),
                    }
                }
                PasswordValidation::Invalid => {
                    if asked {
                        return Err(Error::InvalidPassword);
                    }
                    match self.ask_provider() {
                        Some(next) => {
                            password = next;
                            asked = true;
                        }
                        None if password.is_empty() => return Err(Error::PasswordRequired),
                        None => return Err(Error::InvalidPassword),
                    }
                }
            }
        }
    }

    fn ask_provider(&mut self) -> Option<Vec<u8>> {
        self.options.password_provider.as_mut().and_then(|provider| provider())
    }
}

fn parse_header(bytes: &[u8]) -> Result<String> {
    let rest = bytes.strip_prefix(b"%PDF-").ok_or(Error::Header)?;
    let end = rest
        .iter()
        .position(|&byte| byte == b'\r' || byte == b'\n')
        .ok_or(Error::Header)?;
    let version = std::str::from_utf8(&rest[..end]).map_err(|_| Error::Header)?;
    if version.is_empty() {
        return Err(Error::Header);
    }
    Ok(version.to_string())
}

/// Position of the last `startxref` keyword, searched backward from EOF.
fn find_startxref(bytes: &[u8]) -> Result<u64> {
    let tail_start = bytes.len().saturating_sub(STARTXREF_WINDOW);
    let tail = &bytes[tail_start..];
    let position = tail
        .windows(b"startxref".len())
        .rposition(|window| window == b"startxref")
        .ok_or(Error::Xref(XrefError::Start))?;
    Ok((tail_start + position) as u64)
}

/// Reads the whole `/Prev` chain, newest first. Offsets already visited end
/// the walk; a chain that loops is structurally damaged.
fn read_trailer_chain(
    parser: &mut Parser<Cursor<Vec<u8>>>, first_offset: u64, file_len: u64,
) -> Result<Vec<Trailer>> {
    let mut trailers = Vec::new();
    let mut seen = HashSet::new();
    let mut next_offset = Some(first_offset);
    while let Some(offset) = next_offset {
        if offset >= file_len {
            return Err(Error::Xref(if trailers.is_empty() {
                XrefError::Start
            } else {
                XrefError::PrevStart
            }));
        }
        if !seen.insert(offset) {
            return Err(Error::Xref(XrefError::PrevStart));
        }
        parser.set_position(offset);
        let (xref, dict, kind) = parser.read_cross_reference_section(&no_lookup)?;
        let trailer = Trailer::new(dict, kind, xref, offset);
        next_offset = trailer.prev_offset();
        trailers.push(trailer);
    }
    Ok(trailers)
}

fn lookup_offset(table: &CrossReferenceTable, id: ObjectId) -> Option<u64> {
    match table.lookup(id).or_else(|| table.lookup_number(id.0).map(|(_, e)| e)) {
        Some(XrefEntry::Normal { offset, .. }) => Some(*offset),
        _ => None,
    }
}

/// Reads every object the union table names: first the top-level ones, then
/// the members of object streams.
fn read_objects(
    parser: &mut Parser<Cursor<Vec<u8>>>, document: &mut Document, union: &CrossReferenceTable,
    source_trailer: &BTreeMap<u32, usize>,
) -> Result<()> {
    let entries: Vec<(ObjectId, XrefEntry)> = union.iter().map(|(id, entry)| (*id, *entry)).collect();
    let lookup = |id: ObjectId| lookup_offset(union, id);

    let mut compressed: Vec<(ObjectId, u32, u16)> = Vec::new();
    for &(id, entry) in &entries {
        match entry {
            XrefEntry::Normal { offset, .. } => {
                let (_, object) = parser.read_indirect_object(offset, Some(id), &lookup)?;
                register_object(document, source_trailer, id, object);
            }
            XrefEntry::Compressed { container, index } => {
                compressed.push((id, container, index));
            }
            XrefEntry::Free => {}
        }
    }

    let mut containers: BTreeMap<u32, ObjectStream> = BTreeMap::new();
    for (id, container, index) in compressed {
        if !containers.contains_key(&container) {
            let stream = document
                .objects
                .get(&(container, 0))
                .ok_or(Error::MissingObject((container, 0)))?
                .as_stream()?;
            containers.insert(container, ObjectStream::parse(stream)?);
        }
        let object_stream = &containers[&container];
        let member = object_stream.get(index as usize);
        let object = match member {
            Some((member_id, object)) if member_id.0 == id.0 => object.clone(),
            _ => {
                // The index is stale; fall back to the header's numbering.
                warn!("object stream {} entry {} does not match object {}", container, index, id.0);
                object_stream
                    .objects
                    .iter()
                    .find(|(member_id, _)| member_id.0 == id.0)
                    .map(|(_, object)| object.clone())
                    .ok_or(Error::MissingObject(id))?
            }
        };
        document.objects.insert((id.0, 0), object);
    }
    Ok(())
}

/// Inserts one parsed object, registering object-stream containers with
/// their owning trailer and picking up the linearization hint.
fn register_object(
    document: &mut Document, source_trailer: &BTreeMap<u32, usize>, id: ObjectId, object: Object,
) {
    if let Ok(dict) = object.as_dict() {
        if object.as_stream().is_ok() && dict.type_is(b"ObjStm") {
            let index = source_trailer.get(&id.0).copied().unwrap_or(0);
            document.trailers[index].object_streams.push(id.0);
        }
        if dict.has(b"Linearized") {
            let hint_stream = dict.get_array(b"H").ok().flatten().and_then(|h| {
                match (h.first().and_then(|v| v.as_i64().ok()), h.get(1).and_then(|v| v.as_i64().ok())) {
                    (Some(offset), Some(length)) => Some((offset, length)),
                    _ => None,
                }
            });
            document.linearization = Some(Linearization {
                object_id: id,
                hint_stream,
            });
        }
    }
    document.objects.insert(id, object);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parsing() {
        assert_eq!(parse_header(b"%PDF-1.7\n%\xC2\xA5\n").unwrap(), "1.7");
        assert!(parse_header(b"not a pdf").is_err());
    }

    #[test]
    fn startxref_is_found_near_the_tail() {
        let bytes = b"%PDF-1.4\njunk startxref junk\nstartxref\n42\n%%EOF\n";
        let position = find_startxref(bytes).unwrap() as usize;
        assert_eq!(&bytes[position..position + 9], b"startxref");
        assert!(position > 14);
    }
}
