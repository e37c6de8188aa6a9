//! The PDF object model.
//!
//! Values are owned trees. Stream payloads are [`Bytes`] so that streams
//! read from a file share its buffer instead of copying it.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use indexmap::IndexMap;

/// Dictionary type. Insertion order is kept so that re-serialized output is
/// deterministic and mirrors the input.
pub type PDFDict = IndexMap<String, PDFObject>;

/// Shared `null`, returned when a reference resolves to nothing.
pub static NULL: PDFObject = PDFObject::Null;

#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Decoded name, without the leading `/` and with `#xx` escapes applied.
    Name(String),
    /// Literal or hex string, as raw bytes.
    String(Vec<u8>),
    Array(Vec<Self>),
    Dict(PDFDict),
    Stream(Box<PDFStream>),
    Ref(PDFObjRef),
}

impl PDFObject {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    const fn mismatch(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }

    pub const fn as_int(&self) -> Result<i64> {
        if let Self::Int(n) = self {
            Ok(*n)
        } else {
            Err(self.mismatch("int"))
        }
    }

    /// Integers widen to `f64`; PDF writers mix the two freely.
    pub const fn as_num(&self) -> Result<f64> {
        match *self {
            Self::Int(n) => Ok(n as f64),
            Self::Real(v) => Ok(v),
            _ => Err(self.mismatch("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        if let Self::Name(name) = self {
            Ok(name)
        } else {
            Err(self.mismatch("name"))
        }
    }

    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        if let Self::Array(items) = self {
            Ok(items)
        } else {
            Err(self.mismatch("array"))
        }
    }

    /// Dictionary view. Streams answer with their attribute dictionary.
    pub fn as_dict(&self) -> Result<&PDFDict> {
        match self {
            Self::Dict(dict) => Ok(dict),
            Self::Stream(stream) => Ok(&stream.attrs),
            other => Err(other.mismatch("dict")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut PDFDict> {
        match self {
            Self::Dict(dict) => Ok(dict),
            Self::Stream(stream) => Ok(&mut stream.attrs),
            other => Err(other.mismatch("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&PDFStream> {
        if let Self::Stream(stream) = self {
            Ok(stream)
        } else {
            Err(self.mismatch("stream"))
        }
    }

    pub const fn as_objref(&self) -> Result<PDFObjRef> {
        if let Self::Ref(r) = self {
            Ok(*r)
        } else {
            Err(self.mismatch("ref"))
        }
    }

    /// `true` if this is a name equal to `name`.
    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, Self::Name(n) if n == name)
    }

    /// Calls `f` for every reference contained in this object, recursively
    /// through arrays, dictionaries and stream dictionaries.
    pub fn for_each_ref(&self, f: &mut impl FnMut(PDFObjRef)) {
        match self {
            Self::Ref(r) => f(*r),
            Self::Array(arr) => arr.iter().for_each(|item| item.for_each_ref(f)),
            Self::Dict(dict) => dict.values().for_each(|item| item.for_each_ref(f)),
            Self::Stream(stream) => stream.attrs.values().for_each(|item| item.for_each_ref(f)),
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Real(_)
            | Self::Name(_)
            | Self::String(_) => {}
        }
    }

    /// Short kind label used in type errors.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// `objid genno R`.
///
/// Also serves as the key of the document's object table, so it orders by
/// object number first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PDFObjRef {
    pub objid: u32,
    pub genno: u32,
}

impl PDFObjRef {
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

impl std::fmt::Display for PDFObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.objid, self.genno)
    }
}

/// A stream: attribute dictionary plus undecoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    pub attrs: PDFDict,
    /// Encoded bytes, usually a slice of the input buffer.
    data: Bytes,
}

impl PDFStream {
    pub fn new(attrs: PDFDict, data: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            data: data.into(),
        }
    }

    /// Payload as stored, before any filter is applied.
    pub fn get_rawdata(&self) -> &[u8] {
        &self.data
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&PDFObject> {
        self.attrs.get(key)
    }

    /// `true` when `/Type` equals `type_name`.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.get("Type").is_some_and(|t| t.is_name(type_name))
    }
}
