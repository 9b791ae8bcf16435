//! Hook surface for security handlers. The cryptographic protocol itself
//! lives in the embedding application; the core only drives validation and
//! the in-place transforms at the right points of the open and save paths.

use crate::{Dictionary, Document, Result};

/// Outcome of checking a password against the `/Encrypt` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordValidation {
    Invalid,
    UserPassword,
    OwnerPassword,
}

/// Per-document transform hooks.
///
/// `validate_password` runs right after the cross-reference machinery is
/// read and before any object decoding. `decrypt_document` runs once all
/// objects are loaded; `encrypt_document` runs once per save, after objects
/// are positioned and before bodies are written. Both transform string and
/// stream bytes in place.
pub trait SecurityHandler: std::fmt::Debug {
    fn validate_password(&self, encrypt: &Dictionary, password: &[u8]) -> PasswordValidation;

    fn decrypt_document(&self, document: &mut Document) -> Result<()>;

    fn encrypt_document(&self, document: &mut Document) -> Result<()>;
}

/// Callback consulted when the supplied password does not open the document,
/// or when modification requires the owner password.
pub type PasswordProvider<'a> = dyn FnMut() -> Option<Vec<u8>> + 'a;

/// Accepts every password and leaves bytes untouched.
#[derive(Debug, Default)]
pub struct NoopSecurityHandler;

impl SecurityHandler for NoopSecurityHandler {
    fn validate_password(&self, _encrypt: &Dictionary, _password: &[u8]) -> PasswordValidation {
        PasswordValidation::OwnerPassword
    }

    fn decrypt_document(&self, _document: &mut Document) -> Result<()> {
        Ok(())
    }

    fn encrypt_document(&self, _document: &mut Document) -> Result<()> {
        Ok(())
    }
}
