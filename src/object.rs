use crate::{Error, Result};
use linked_hash_map::{self, Iter, IterMut, LinkedHashMap};
use log::warn;
use std::fmt;

/// Object identifier consists of two parts: object number and generation number.
pub type ObjectId = (u32, u16);

/// Head of the free list. Never names a real object.
pub const FREE_LIST_HEAD: ObjectId = (0, 65535);

/// Encoding hint attached to a literal string.
///
/// The lexer tags a string according to its byte-order mark: `FE FF` yields
/// [`StringEncoding::Utf16Be`], `FF FE` yields [`StringEncoding::Utf16Le`],
/// anything else stays [`StringEncoding::Raw`]. [`StringEncoding::PdfDoc`] is
/// assigned programmatically, see [`Object::text_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Raw,
    PdfDoc,
    Utf16Be,
    Utf16Le,
}

/// Digit case observed in a parsed hexadecimal string, reproduced on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexCase {
    Upper,
    Lower,
}

impl Default for HexCase {
    fn default() -> HexCase {
        HexCase::Upper
    }
}

/// Dictionary object. Iteration preserves insertion order.
#[derive(Clone, Default)]
pub struct Dictionary(LinkedHashMap<Vec<u8>, Object>);

/// Stream object.
///
/// The stream dictionary may be direct, but every stream itself is indirect.
#[derive(Debug, Clone)]
pub struct Stream {
    pub dict: Dictionary,
    /// Raw content bytes, filtered as stored in the file.
    pub content: Vec<u8>,
    /// Content streams, form XObjects and object streams must keep their
    /// exact bytes; those set this to false.
    pub allows_compression: bool,
    /// Byte position of the stream payload within the source file.
    pub start_position: Option<u64>,
}

/// Basic PDF object types defined in an enum.
#[derive(Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i32),
    UInteger(u32),
    Real(f64),
    Name(Vec<u8>),
    String(Vec<u8>, StringEncoding),
    HexString(Vec<u8>, HexCase),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

macro_rules! from_smaller_ints {
    ($( $Int: ty )+) => {
        $(
            impl From<$Int> for Object {
                fn from(number: $Int) -> Self {
                    Object::Integer(i32::from(number))
                }
            }
        )+
    }
}

from_smaller_ints! {
    i8 i16 i32
    u8 u16
}

impl From<u32> for Object {
    fn from(number: u32) -> Self {
        match i32::try_from(number) {
            Ok(n) => Object::Integer(n),
            Err(_) => Object::UInteger(number),
        }
    }
}

impl From<i64> for Object {
    fn from(number: i64) -> Self {
        Object::integer(number)
    }
}

impl From<f64> for Object {
    fn from(number: f64) -> Self {
        Object::Real(number)
    }
}

impl From<f32> for Object {
    fn from(number: f32) -> Self {
        Object::Real(f64::from(number))
    }
}

impl From<String> for Object {
    fn from(name: String) -> Self {
        Object::Name(name.into_bytes())
    }
}

impl<'a> From<&'a str> for Object {
    fn from(name: &'a str) -> Self {
        Object::Name(name.as_bytes().to_vec())
    }
}

impl From<Vec<Object>> for Object {
    fn from(array: Vec<Object>) -> Self {
        Object::Array(array)
    }
}

impl From<Dictionary> for Object {
    fn from(dict: Dictionary) -> Self {
        Object::Dictionary(dict)
    }
}

impl From<Stream> for Object {
    fn from(stream: Stream) -> Self {
        Object::Stream(stream)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Object::Reference(id)
    }
}

impl Object {
    pub fn string_literal<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::String(s.into(), StringEncoding::Raw)
    }

    /// Creates a text string. ASCII input is tagged as PDFDocEncoding,
    /// anything else is encoded as UTF-16BE.
    pub fn text_string(text: &str) -> Self {
        if text.is_ascii() {
            return Object::String(text.as_bytes().to_vec(), StringEncoding::PdfDoc);
        }
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringEncoding::Utf16Be)
    }

    /// Classifies an integer the way the lexer does: `Integer` when it fits
    /// in i32, `UInteger` when it fits in u32, `Real` otherwise.
    pub fn integer(number: i64) -> Self {
        if let Ok(n) = i32::try_from(number) {
            Object::Integer(n)
        } else if let Ok(n) = u32::try_from(number) {
            Object::UInteger(n)
        } else {
            Object::Real(number as f64)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(value) => Ok(*value),
            _ => Err(Error::ObjectType {
                expected: "Boolean",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Integer(value) => Ok(i64::from(*value)),
            Object::UInteger(value) => Ok(i64::from(*value)),
            _ => Err(Error::ObjectType {
                expected: "Integer",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Object::Integer(value) => Ok(f64::from(*value)),
            Object::UInteger(value) => Ok(f64::from(*value)),
            Object::Real(value) => Ok(*value),
            _ => Err(Error::ObjectType {
                expected: "Real",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(name) => Ok(name),
            _ => Err(Error::ObjectType {
                expected: "Name",
                found: self.enum_variant(),
            }),
        }
    }

    /// Byte content of a literal or hexadecimal string.
    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(bytes, _) | Object::HexString(bytes, _) => Ok(bytes),
            _ => Err(Error::ObjectType {
                expected: "String",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_str_mut(&mut self) -> Result<&mut Vec<u8>> {
        match self {
            Object::String(bytes, _) | Object::HexString(bytes, _) => Ok(bytes),
            _ => Err(Error::ObjectType {
                expected: "String",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(id) => Ok(*id),
            _ => Err(Error::ObjectType {
                expected: "Reference",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Object>> {
        match self {
            Object::Array(array) => Ok(array),
            _ => Err(Error::ObjectType {
                expected: "Array",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Object>> {
        match self {
            Object::Array(array) => Ok(array),
            _ => Err(Error::ObjectType {
                expected: "Array",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&stream.dict),
            _ => Err(Error::ObjectType {
                expected: "Dictionary",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&mut stream.dict),
            _ => Err(Error::ObjectType {
                expected: "Dictionary",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(Error::ObjectType {
                expected: "Stream",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(Error::ObjectType {
                expected: "Stream",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn type_name(&self) -> Result<&[u8]> {
        match self {
            Object::Dictionary(dict) => dict.type_name(),
            Object::Stream(stream) => stream.dict.type_name(),
            _ => Err(Error::ObjectType {
                expected: "Dictionary",
                found: self.enum_variant(),
            }),
        }
    }

    pub fn enum_variant(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::UInteger(_) => "UInteger",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::String(..) => "String",
            Object::HexString(..) => "HexString",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Object::Null => f.write_str("null"),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Integer(value) => write!(f, "{}", value),
            Object::UInteger(value) => write!(f, "{}", value),
            Object::Real(value) => write!(f, "{}", value),
            Object::Name(name) => write!(f, "/{}", String::from_utf8_lossy(name)),
            Object::String(bytes, _) => write!(f, "({})", String::from_utf8_lossy(bytes)),
            Object::HexString(bytes, _) => {
                f.write_str("<")?;
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                f.write_str(">")
            }
            Object::Array(array) => {
                let items = array.iter().map(|item| format!("{:?}", item)).collect::<Vec<_>>();
                write!(f, "[{}]", items.join(" "))
            }
            Object::Dictionary(dict) => write!(f, "{:?}", dict),
            Object::Stream(stream) => write!(f, "{:?}stream...endstream", stream.dict),
            Object::Reference(id) => write!(f, "{} {} R", id.0, id.1),
        }
    }
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary(LinkedHashMap::new())
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.0.get(key).ok_or_else(|| Error::DictKey(key.to_vec()))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.0.get_mut(key).ok_or_else(|| Error::DictKey(key.to_vec()))
    }

    /// Integer value of `key`; 0 when the key is absent, an error when the
    /// value is not a number.
    pub fn get_integer(&self, key: &[u8]) -> Result<i64> {
        match self.0.get(key) {
            Some(object) => object.as_i64(),
            None => Ok(0),
        }
    }

    /// Name bytes of `key`; empty when the key is absent.
    pub fn get_name(&self, key: &[u8]) -> Result<&[u8]> {
        match self.0.get(key) {
            Some(object) => object.as_name(),
            None => Ok(b""),
        }
    }

    /// String bytes of `key`; empty when the key is absent.
    pub fn get_string(&self, key: &[u8]) -> Result<&[u8]> {
        match self.0.get(key) {
            Some(object) => object.as_str(),
            None => Ok(b""),
        }
    }

    /// Rectangle `[llx lly urx ury]` of `key`; zeroed when the key is absent.
    pub fn get_rectangle(&self, key: &[u8]) -> Result<[f64; 4]> {
        let array = match self.0.get(key) {
            Some(object) => object.as_array()?,
            None => return Ok([0.0; 4]),
        };
        if array.len() != 4 {
            return Err(Error::ObjectType {
                expected: "Rectangle",
                found: "Array",
            });
        }
        let mut rect = [0.0; 4];
        for (slot, value) in rect.iter_mut().zip(array) {
            *slot = value.as_f64()?;
        }
        Ok(rect)
    }

    /// Dictionary value of `key`, or None when the key is absent.
    pub fn get_dictionary(&self, key: &[u8]) -> Result<Option<&Dictionary>> {
        match self.0.get(key) {
            Some(object) => object.as_dict().map(Some),
            None => Ok(None),
        }
    }

    /// Array value of `key`, or None when the key is absent.
    pub fn get_array(&self, key: &[u8]) -> Result<Option<&Vec<Object>>> {
        match self.0.get(key) {
            Some(object) => object.as_array().map(Some),
            None => Ok(None),
        }
    }

    /// Reference value of `key`, or None when the key is absent.
    pub fn get_reference(&self, key: &[u8]) -> Result<Option<ObjectId>> {
        match self.0.get(key) {
            Some(object) => object.as_reference().map(Some),
            None => Ok(None),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.remove(key)
    }

    pub fn type_name(&self) -> Result<&[u8]> {
        self.0
            .get(b"Type".as_slice())
            .and_then(|obj| obj.as_name().ok())
            .or_else(|| {
                if self.0.contains_key(b"Linearized".as_slice()) {
                    Some(b"Linearized".as_slice())
                } else {
                    None
                }
            })
            .ok_or_else(|| Error::DictKey(b"Type".to_vec()))
    }

    pub fn type_is(&self, type_name: &[u8]) -> bool {
        self.0.get(b"Type".as_slice()).and_then(|obj| obj.as_name().ok()) == Some(type_name)
    }

    pub fn iter(&self) -> Iter<'_, Vec<u8>, Object> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, Vec<u8>, Object> {
        self.0.iter_mut()
    }
}

#[macro_export]
macro_rules! dictionary {
    () => {
        $crate::Dictionary::new()
    };
    ($( $key: expr => $value: expr ),+ ,) => {
        dictionary!( $($key => $value),+ )
    };
    ($( $key: expr => $value: expr ),*) => {{
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $value);
        )*
        dict
    }}
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let entries = self
            .into_iter()
            .map(|(key, value)| format!("/{} {:?}", String::from_utf8_lossy(key), value))
            .collect::<Vec<_>>();
        write!(f, "<<{}>>", entries.concat())
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Dictionary) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Stream) -> bool {
        self.dict == other.dict && self.content == other.content
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Vec<u8>, &'a Object);
    type IntoIter = linked_hash_map::Iter<'a, Vec<u8>, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<Vec<u8>>> FromIterator<(K, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, Object)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter.into_iter() {
            dict.set(k, v);
        }
        dict
    }
}

impl Stream {
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Stream {
        dict.set("Length", content.len() as i64);
        Stream {
            dict,
            content,
            allows_compression: true,
            start_position: None,
        }
    }

    /// A stream whose `/Length` was indirect and not yet resolvable; the
    /// payload starts at `position` and is read in a later pass.
    pub fn with_position(dict: Dictionary, position: u64) -> Stream {
        Stream {
            dict,
            content: vec![],
            allows_compression: true,
            start_position: Some(position),
        }
    }

    /// Content streams, form XObjects and object streams must not be packed
    /// into object streams and keep their own filter chain.
    #[inline]
    pub fn with_compression(mut self, allows_compression: bool) -> Stream {
        self.allows_compression = allows_compression;
        self
    }

    /// Filter names from `/Filter`, which holds either a name or an array of
    /// names applied in order.
    pub fn filters(&self) -> Result<Vec<&[u8]>> {
        match self.dict.get(b"Filter") {
            Ok(Object::Name(name)) => Ok(vec![name.as_slice()]),
            Ok(Object::Array(names)) => names.iter().map(|n| n.as_name()).collect(),
            Ok(other) => Err(Error::ObjectType {
                expected: "Name",
                found: other.enum_variant(),
            }),
            Err(err) => Err(err),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.dict.has(b"Filter")
    }

    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
        self.dict.set("Length", self.content.len() as i64);
    }

    /// Applies FlateDecode to the content. The `/Filter` entry must be absent
    /// so already-filtered bytes are never compressed twice.
    pub fn compress(&mut self) -> Result<()> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        if self.dict.has(b"Filter") {
            return Ok(());
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(self.content.as_slice())?;
        let compressed = encoder.finish()?;
        if compressed.len() + 19 < self.content.len() {
            self.dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            self.set_content(compressed);
        }
        Ok(())
    }

    /// Content bytes with the whole filter chain undone.
    pub fn decompressed_content(&self) -> Result<Vec<u8>> {
        crate::filters::decode(&self.content, &self.dict)
    }

    pub fn decompress(&mut self) -> Result<()> {
        if !self.is_compressed() {
            return Ok(());
        }
        match self.decompressed_content() {
            Ok(data) => {
                self.dict.remove(b"DecodeParms");
                self.dict.remove(b"Filter");
                self.set_content(data);
                Ok(())
            }
            Err(err @ Error::UnsupportedFilter(_)) => {
                warn!("stream kept filtered: {}", err);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_classification() {
        assert_eq!(Object::integer(123), Object::Integer(123));
        assert_eq!(Object::integer(-1), Object::Integer(-1));
        assert_eq!(Object::integer(2_996_984_786), Object::UInteger(2_996_984_786));
        assert_eq!(Object::integer(264_584_027_963_392), Object::Real(264_584_027_963_392.0));
    }

    #[test]
    fn dictionary_preserves_insertion_order() {
        let dict = dictionary! {
            "Zebra" => 1,
            "Alpha" => 2,
            "Mango" => 3,
        };
        let keys: Vec<_> = dict.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"Zebra".as_slice(), b"Alpha", b"Mango"]);
    }

    #[test]
    fn typed_accessors_default_when_absent() {
        let dict = dictionary! { "N" => 7 };
        assert_eq!(dict.get_integer(b"N").unwrap(), 7);
        assert_eq!(dict.get_integer(b"Missing").unwrap(), 0);
        assert_eq!(dict.get_name(b"Missing").unwrap(), b"");
        assert!(dict.get_dictionary(b"Missing").unwrap().is_none());
        assert!(dict.get_integer(b"N").is_ok());
        assert!(dictionary! { "N" => "NotANumber" }.get_integer(b"N").is_err());
    }

    #[test]
    fn text_string_encodings() {
        match Object::text_string("plain") {
            Object::String(bytes, StringEncoding::PdfDoc) => assert_eq!(bytes, b"plain"),
            other => panic!("unexpected {:?}", other),
        }
        match Object::text_string("süß") {
            Object::String(bytes, StringEncoding::Utf16Be) => assert_eq!(bytes.len() % 2, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn compress_skips_filtered_streams() {
        let mut stream = Stream::new(dictionary! {}, b"hello hello hello hello hello".to_vec());
        stream.dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        let before = stream.content.clone();
        stream.compress().unwrap();
        assert_eq!(stream.content, before);
    }
}
