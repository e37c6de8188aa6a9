//! PDF Document - the in-memory object graph.
//!
//! Objects are owned by a single table keyed by object number; every link
//! between them is a [`PDFObjRef`] looked up in that table.

use crate::codec::{Filter, decode_filters};
use crate::error::{PdfError, Result};
use crate::model::{NULL, PDFDict, PDFObjRef, PDFObject, PDFStream};
use std::collections::BTreeMap;

/// Reference chains longer than this resolve to null.
const MAX_REF_CHAIN: usize = 32;

/// Highest generation number a free entry may carry.
pub const MAX_GENERATION: u32 = 65535;

/// One materialized indirect object.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub genno: u32,
    pub object: PDFObject,
}

/// A loaded PDF document.
#[derive(Debug, Clone, Default)]
pub struct PDFDocument {
    objects: BTreeMap<u32, IndirectObject>,
    /// Trailer entries carried to the output (`/Root`, `/Info`, `/ID`)
    trailer: PDFDict,
    /// Header version, e.g. "1.7"
    version: String,
    /// Free object numbers mapped to the generation the next use would get
    freed: BTreeMap<u32, u32>,
}

impl PDFDocument {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// Header version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub const fn trailer(&self) -> &PDFDict {
        &self.trailer
    }

    pub const fn trailer_mut(&mut self) -> &mut PDFDict {
        &mut self.trailer
    }

    /// Reference to the document catalog from the trailer.
    pub fn root_ref(&self) -> Result<PDFObjRef> {
        match self.trailer.get("Root") {
            Some(PDFObject::Ref(r)) => Ok(*r),
            Some(other) => Err(PdfError::MalformedContainer(format!(
                "trailer /Root is a {}, not a reference",
                other.type_name()
            ))),
            None => Err(PdfError::MalformedContainer("trailer has no /Root".into())),
        }
    }

    /// The catalog dictionary.
    pub fn catalog(&self) -> Result<&PDFDict> {
        let root = self.root_ref()?;
        self.get(root.objid)
            .and_then(|obj| obj.as_dict().ok())
            .ok_or_else(|| PdfError::MalformedContainer(format!("catalog {root} is not a dictionary")))
    }

    /// Number of materialized objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, objid: u32) -> bool {
        self.objects.contains_key(&objid)
    }

    /// Get an object by number.
    pub fn get(&self, objid: u32) -> Option<&PDFObject> {
        self.objects.get(&objid).map(|entry| &entry.object)
    }

    pub fn get_mut(&mut self, objid: u32) -> Option<&mut PDFObject> {
        self.objects.get_mut(&objid).map(|entry| &mut entry.object)
    }

    /// Generation number of a materialized object.
    pub fn genno(&self, objid: u32) -> Option<u32> {
        self.objects.get(&objid).map(|entry| entry.genno)
    }

    /// Full reference (number and generation) for a materialized object.
    pub fn ref_of(&self, objid: u32) -> Option<PDFObjRef> {
        self.genno(objid).map(|genno| PDFObjRef::new(objid, genno))
    }

    /// Insert or replace an object.
    pub fn insert(&mut self, r: PDFObjRef, object: PDFObject) {
        self.freed.remove(&r.objid);
        self.objects.insert(
            r.objid,
            IndirectObject {
                genno: r.genno,
                object,
            },
        );
    }

    /// Store `object` under a fresh object number and return its reference.
    pub fn add(&mut self, object: PDFObject) -> PDFObjRef {
        let r = PDFObjRef::new(self.next_objid(), 0);
        self.insert(r, object);
        r
    }

    /// Smallest object number above every used or freed number.
    pub fn next_objid(&self) -> u32 {
        let used = self.objects.last_key_value().map_or(0, |(id, _)| *id);
        let freed = self.freed.last_key_value().map_or(0, |(id, _)| *id);
        used.max(freed) + 1
    }

    /// Delete an object, recording its number as free with the next
    /// generation.
    pub fn remove(&mut self, objid: u32) -> Option<PDFObject> {
        let entry = self.objects.remove(&objid)?;
        self.freed
            .insert(objid, (entry.genno + 1).min(MAX_GENERATION));
        Some(entry.object)
    }

    /// Record a free number read from the input.
    pub fn mark_free(&mut self, objid: u32, next_gen: u32) {
        if objid != 0 && !self.objects.contains_key(&objid) {
            self.freed.insert(objid, next_gen.min(MAX_GENERATION));
        }
    }

    /// Free object numbers with their next generation.
    pub const fn freed(&self) -> &BTreeMap<u32, u32> {
        &self.freed
    }

    /// Iterate objects in ascending object number.
    pub fn iter(&self) -> impl Iterator<Item = (PDFObjRef, &PDFObject)> {
        self.objects
            .iter()
            .map(|(&objid, entry)| (PDFObjRef::new(objid, entry.genno), &entry.object))
    }

    /// Object numbers in ascending order.
    pub fn objids(&self) -> Vec<u32> {
        self.objects.keys().copied().collect()
    }

    /// Follow references until a direct object is reached.
    ///
    /// Missing targets and over-long chains resolve to null.
    pub fn resolve<'a>(&'a self, obj: &'a PDFObject) -> &'a PDFObject {
        let mut current = obj;
        for _ in 0..MAX_REF_CHAIN {
            match current {
                PDFObject::Ref(r) => match self.get(r.objid) {
                    Some(target) => current = target,
                    None => return &NULL,
                },
                direct => return direct,
            }
        }
        &NULL
    }

    /// Resolve and view as a dictionary (stream dictionaries included).
    pub fn resolve_dict<'a>(&'a self, obj: &'a PDFObject) -> Option<&'a PDFDict> {
        self.resolve(obj).as_dict().ok()
    }

    /// Resolve and view as a number.
    pub fn resolve_num(&self, obj: &PDFObject) -> Option<f64> {
        self.resolve(obj).as_num().ok()
    }

    /// Look up `key` in `dict` and resolve it.
    pub fn dict_get<'a>(&'a self, dict: &'a PDFDict, key: &str) -> Option<&'a PDFObject> {
        dict.get(key).map(|v| self.resolve(v)).filter(|v| !v.is_null())
    }

    /// Decode a stream's payload through its filter chain.
    ///
    /// `limit` caps the decoded size ([`PdfError::ResourceLimitExceeded`]).
    pub fn decode_stream(&self, stream: &PDFStream, limit: usize) -> Result<Vec<u8>> {
        let filters: Vec<Filter> = match stream.get("Filter").map(|f| self.resolve(f)) {
            None | Some(PDFObject::Null) => Vec::new(),
            Some(PDFObject::Name(name)) => vec![Filter::from_name(name)],
            Some(PDFObject::Array(arr)) => arr
                .iter()
                .map(|item| match self.resolve(item) {
                    PDFObject::Name(name) => Ok(Filter::from_name(name)),
                    other => Err(PdfError::MalformedContainer(format!(
                        "filter entry is a {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<_>>()?,
            Some(other) => {
                return Err(PdfError::MalformedContainer(format!(
                    "/Filter is a {}",
                    other.type_name()
                )));
            }
        };

        let parms: Vec<Option<&PDFDict>> =
            match stream.get("DecodeParms").map(|p| self.resolve(p)) {
                Some(PDFObject::Array(arr)) => arr.iter().map(|p| self.resolve_dict(p)).collect(),
                Some(PDFObject::Dict(d)) => vec![Some(d)],
                _ => Vec::new(),
            };

        let chain: Vec<(Filter, Option<&PDFDict>)> = filters
            .into_iter()
            .enumerate()
            .map(|(i, filter)| (filter, parms.get(i).copied().flatten()))
            .collect();

        decode_filters(stream.get_rawdata(), &chain, limit)
    }

    /// Rewrite references to absent objects: array elements become null and
    /// dictionary entries are dropped. Returns how many were rewritten.
    pub fn normalize_dangling_refs(&mut self) -> usize {
        let present: rustc_hash::FxHashSet<u32> = self.objects.keys().copied().collect();
        let mut count = 0;
        for entry in self.objects.values_mut() {
            count += prune_dangling(&mut entry.object, &present);
        }
        let mut trailer = PDFObject::Dict(std::mem::take(&mut self.trailer));
        count += prune_dangling(&mut trailer, &present);
        if let PDFObject::Dict(d) = trailer {
            self.trailer = d;
        }
        count
    }
}

fn prune_dangling(obj: &mut PDFObject, present: &rustc_hash::FxHashSet<u32>) -> usize {
    let is_dangling = |o: &PDFObject| matches!(o, PDFObject::Ref(r) if !present.contains(&r.objid));
    let mut count = 0;
    match obj {
        PDFObject::Array(arr) => {
            for item in arr.iter_mut() {
                if is_dangling(item) {
                    *item = PDFObject::Null;
                    count += 1;
                } else {
                    count += prune_dangling(item, present);
                }
            }
        }
        PDFObject::Dict(dict) => count += prune_dict(dict, present),
        PDFObject::Stream(stream) => count += prune_dict(&mut stream.attrs, present),
        _ => {}
    }
    count
}

fn prune_dict(dict: &mut PDFDict, present: &rustc_hash::FxHashSet<u32>) -> usize {
    let before = dict.len();
    dict.retain(|_, v| !matches!(v, PDFObject::Ref(r) if !present.contains(&r.objid)));
    let mut count = before - dict.len();
    for value in dict.values_mut() {
        count += prune_dangling(value, present);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[(&str, PDFObject)]) -> PDFDict {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_resolve_follows_chain_and_missing_is_null() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(PDFObjRef::new(1, 0), PDFObject::Ref(PDFObjRef::new(2, 0)));
        doc.insert(PDFObjRef::new(2, 0), PDFObject::Int(42));
        assert_eq!(doc.resolve(&PDFObject::Ref(PDFObjRef::new(1, 0))), &PDFObject::Int(42));
        assert!(doc.resolve(&PDFObject::Ref(PDFObjRef::new(9, 0))).is_null());
    }

    #[test]
    fn test_self_reference_resolves_to_null() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(PDFObjRef::new(1, 0), PDFObject::Ref(PDFObjRef::new(1, 0)));
        assert!(doc.resolve(&PDFObject::Ref(PDFObjRef::new(1, 0))).is_null());
    }

    #[test]
    fn test_remove_records_next_generation() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(PDFObjRef::new(3, 2), PDFObject::Null);
        assert!(doc.remove(3).is_some());
        assert_eq!(doc.freed().get(&3), Some(&3));
        assert_eq!(doc.next_objid(), 4);
        let r = doc.add(PDFObject::Int(1));
        assert_eq!(r, PDFObjRef::new(4, 0));
    }

    #[test]
    fn test_normalize_dangling_refs() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(
            PDFObjRef::new(1, 0),
            PDFObject::Dict(dict(&[
                ("Keep", PDFObject::Ref(PDFObjRef::new(2, 0))),
                ("Drop", PDFObject::Ref(PDFObjRef::new(7, 0))),
                (
                    "Arr",
                    PDFObject::Array(vec![PDFObject::Ref(PDFObjRef::new(8, 0)), PDFObject::Int(1)]),
                ),
            ])),
        );
        doc.insert(PDFObjRef::new(2, 0), PDFObject::Int(5));
        doc.trailer_mut().insert("Info".into(), PDFObject::Ref(PDFObjRef::new(9, 0)));

        assert_eq!(doc.normalize_dangling_refs(), 3);
        let d = doc.get(1).unwrap().as_dict().unwrap();
        assert!(d.contains_key("Keep"));
        assert!(!d.contains_key("Drop"));
        assert_eq!(
            d.get("Arr").unwrap(),
            &PDFObject::Array(vec![PDFObject::Null, PDFObject::Int(1)])
        );
        assert!(doc.trailer().is_empty());
    }

    #[test]
    fn test_decode_stream_with_indirect_filter() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(PDFObjRef::new(5, 0), PDFObject::Name("ASCIIHexDecode".into()));
        let attrs = dict(&[("Filter", PDFObject::Ref(PDFObjRef::new(5, 0)))]);
        let stream = PDFStream::new(attrs, b"414243>".to_vec());
        assert_eq!(doc.decode_stream(&stream, 1024).unwrap(), b"ABC");
    }
}
