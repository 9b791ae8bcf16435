use crate::xref::CrossReferenceTable;
use crate::Dictionary;

/// Form the cross-reference section of this generation was stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailerKind {
    /// A classic `xref` table followed by a `trailer` dictionary.
    Classic,
    /// A PDF 1.5 cross-reference stream.
    CrossReferenceStream,
}

/// One update generation of a document.
///
/// Trailers are kept newest-first in `Document::trailers`; the chain order
/// stands in for the `/Prev` links of the file.
#[derive(Debug, Clone)]
pub struct Trailer {
    pub dict: Dictionary,
    pub kind: TrailerKind,
    pub xref: CrossReferenceTable,
    /// Object numbers of the `/Type /ObjStm` containers owned by this
    /// generation.
    pub object_streams: Vec<u32>,
    /// Set when the document carries a signature; a read-only trailer's
    /// objects must reach the output byte-identical.
    pub is_read_only: bool,
    /// Byte offset of the cross-reference section this trailer came from.
    pub offset: u64,
}

impl Trailer {
    pub fn new(dict: Dictionary, kind: TrailerKind, xref: CrossReferenceTable, offset: u64) -> Trailer {
        Trailer {
            dict,
            kind,
            xref,
            object_streams: Vec::new(),
            is_read_only: false,
            offset,
        }
    }

    /// The working trailer of a freshly constructed document.
    pub fn empty() -> Trailer {
        Trailer::new(Dictionary::new(), TrailerKind::Classic, CrossReferenceTable::new(), 0)
    }

    pub fn prev_offset(&self) -> Option<u64> {
        self.dict
            .get(b"Prev")
            .ok()
            .and_then(|value| value.as_i64().ok())
            .and_then(|offset| u64::try_from(offset).ok())
    }
}
