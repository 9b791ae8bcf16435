#[macro_use]
mod object;
mod datetime;
pub use crate::object::{Dictionary, HexCase, Object, ObjectId, Stream, StringEncoding, FREE_LIST_HEAD};

mod document;
mod object_stream;
mod trailer;
mod xref;
mod xref_stream;
pub use crate::document::{Document, Linearization, OpenMode};
pub use crate::object_stream::{calc_checksum, ObjectStream};
pub use crate::trailer::{Trailer, TrailerKind};
pub use crate::xref::{CrossReferenceTable, XrefEntry};
pub use crate::xref_stream::CrossReferenceStreamEntry;

mod error;
pub use crate::error::{Error, Result, XrefError};

mod filters;
mod lexer;
mod parser;
mod reader;
mod save_options;
mod security;
mod writer;
pub use crate::lexer::{Lexer, Symbol};
pub use crate::parser::Parser;
pub use crate::reader::OpenOptions;
pub use crate::save_options::{ObjectStreamConfig, SaveOptions, SaveOptionsBuilder};
pub use crate::security::{NoopSecurityHandler, PasswordProvider, PasswordValidation, SecurityHandler};
pub use crate::writer::Writer;
