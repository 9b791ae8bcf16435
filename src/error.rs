use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The file does not start with a `%PDF-` header.
    #[error("invalid file header")]
    Header,
    /// An indirect object could not be parsed at the given byte offset.
    #[error("invalid object at byte {offset}")]
    IndirectObject { offset: u64 },
    /// The object number of a parsed object does not match the
    /// cross-reference entry it was reached through.
    #[error("object id mismatch")]
    ObjectIdMismatch,
    #[error("unexpected {found} near byte {offset}")]
    UnexpectedSymbol { found: &'static str, offset: u64 },
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: u64, message: String },
    #[error("invalid file trailer")]
    Trailer,
    #[error("invalid cross-reference ({0})")]
    Xref(XrefError),
    #[error("stream does not match its /Length entry")]
    StreamLength,
    #[error("missing dictionary key {}", String::from_utf8_lossy(.0))]
    DictKey(Vec<u8>),
    #[error("type mismatch: expected {expected}, found {found}")]
    ObjectType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing object {0:?}")]
    MissingObject(crate::ObjectId),

    #[error("unsupported stream filter /{0}")]
    UnsupportedFilter(String),
    #[error("unsupported predictor {0}")]
    UnsupportedPredictor(i64),

    #[error("duplicate object id {0:?}")]
    DuplicateObjectId(crate::ObjectId),
    #[error("dangling reference {0:?}")]
    DanglingReference(crate::ObjectId),
    #[error("cross-reference stream field exceeds four bytes")]
    WidthOverflow,
    #[error("document is read-only")]
    ReadOnly,

    #[error("a password is required to open this document")]
    PasswordRequired,
    #[error("the supplied password is incorrect")]
    InvalidPassword,
    #[error("the owner password is required to modify this document")]
    OwnerPasswordRequired,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum XrefError {
    #[error("could not parse cross-reference section")]
    Parse,
    #[error("invalid startxref offset")]
    Start,
    #[error("invalid offset in /Prev entry")]
    PrevStart,
    #[error("invalid /W widths")]
    StreamWidths,
    #[error("invalid cross-reference stream")]
    Stream,
}
