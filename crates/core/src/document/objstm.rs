//! Object stream expansion.

use super::catalog::PDFDocument;
use super::xref::XRefEntry;
use crate::api::UnredactOptions;
use crate::error::{PdfError, Result};
use crate::limits::Budget;
use crate::model::{PDFObjRef, PDFObject};
use crate::parser::PDFParser;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Header of a decoded object stream: (object number, absolute offset).
fn parse_header(data: &[u8], n: usize, first: usize) -> Result<Vec<(u32, usize)>> {
    let header = data
        .get(..first)
        .ok_or_else(|| PdfError::MalformedContainer("object stream /First beyond data".into()))?;
    let mut parser = PDFParser::new(header);
    let mut pairs = Vec::with_capacity(n.min(header.len() / 4 + 1));
    for _ in 0..n {
        let objid = parser.parse_object()?.as_int()?;
        let offset = parser.parse_object()?.as_int()?;
        let (Ok(objid), Ok(offset)) = (u32::try_from(objid), usize::try_from(offset)) else {
            return Err(PdfError::MalformedContainer("negative object stream header entry".into()));
        };
        pairs.push((objid, first + offset));
    }
    Ok(pairs)
}

/// Materialize the objects held in every object stream of `doc`.
///
/// An object is taken from a stream only when the merged xref index points
/// at that very stream for it, or has no entry for it at all; objects
/// already in the table are never replaced. Running this twice yields the
/// same table.
pub fn expand_object_streams(
    doc: &mut PDFDocument,
    xref: &FxHashMap<u32, XRefEntry>,
    options: &UnredactOptions,
    budget: &mut Budget,
) -> Result<()> {
    let referenced: BTreeSet<u32> = xref
        .values()
        .filter_map(|e| match e {
            XRefEntry::Compressed { stream, .. } => Some(*stream),
            _ => None,
        })
        .collect();

    // Streams typed ObjStm but unlisted in the xref still hold objects
    // for hybrid files that omit the compressed entries.
    let typed: BTreeSet<u32> = doc
        .iter()
        .filter(|(_, obj)| matches!(obj, PDFObject::Stream(s) if s.is_type("ObjStm")))
        .map(|(r, _)| r.objid)
        .collect();

    let mut cache: FxHashMap<u32, Vec<u8>> = FxHashMap::default();

    for stream_id in referenced.union(&typed) {
        budget.check()?;
        let Some(PDFObject::Stream(stream)) = doc.get(*stream_id) else {
            warn!(stream = stream_id, "object stream missing, its objects stay unresolved");
            continue;
        };
        if !stream.is_type("ObjStm") {
            return Err(PdfError::MalformedContainer(format!(
                "object {stream_id} is referenced as an object stream but is not /Type /ObjStm"
            )));
        }
        let n = stream
            .get("N")
            .and_then(|v| v.as_int().ok())
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| PdfError::MalformedContainer(format!("object stream {stream_id} has no /N")))?;
        let first = stream
            .get("First")
            .and_then(|v| v.as_int().ok())
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| {
                PdfError::MalformedContainer(format!("object stream {stream_id} has no /First"))
            })?;

        if !cache.contains_key(stream_id) {
            let decoded = doc.decode_stream(stream, options.max_content_stream_bytes)?;
            cache.insert(*stream_id, decoded);
        }
        let data = &cache[stream_id];
        let header = parse_header(data, n, first)?;

        let mut taken = 0usize;
        for (index, (objid, offset)) in header.into_iter().enumerate() {
            budget.tick()?;
            if objid == 0 || doc.contains(objid) {
                continue;
            }
            let wanted = match xref.get(&objid) {
                Some(XRefEntry::Compressed { stream, index: slot }) => {
                    *stream == *stream_id && *slot as usize == index
                }
                Some(_) => false,
                None => true,
            };
            if !wanted {
                continue;
            }
            let Some(body) = data.get(offset..) else {
                return Err(PdfError::MalformedContainer(format!(
                    "object {objid} offset beyond object stream {stream_id}"
                )));
            };
            let obj = PDFParser::new(body).parse_object()?;
            doc.insert(PDFObjRef::new(objid, 0), obj);
            taken += 1;
        }
        debug!(stream = stream_id, objects = taken, "expanded object stream");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PDFDict, PDFStream};

    fn objstm(body: &[u8], n: i64, first: i64) -> PDFObject {
        let mut attrs = PDFDict::new();
        attrs.insert("Type".into(), PDFObject::Name("ObjStm".into()));
        attrs.insert("N".into(), PDFObject::Int(n));
        attrs.insert("First".into(), PDFObject::Int(first));
        PDFObject::Stream(Box::new(PDFStream::new(attrs, body.to_vec())))
    }

    #[test]
    fn test_expand_respects_xref_ownership() {
        // Objects 4 and 5 in stream 10; object 5 was superseded in-file.
        let body = b"4 0 5 3 42 (old)";
        let mut doc = PDFDocument::new("1.5");
        doc.insert(PDFObjRef::new(10, 0), objstm(body, 2, 8));
        doc.insert(PDFObjRef::new(5, 0), PDFObject::String(b"new".to_vec()));

        let mut xref = FxHashMap::default();
        xref.insert(4, XRefEntry::Compressed { stream: 10, index: 0 });
        xref.insert(5, XRefEntry::InFile { offset: 0, genno: 0 });

        let options = UnredactOptions::default();
        let mut budget = Budget::new(None, 1);
        expand_object_streams(&mut doc, &xref, &options, &mut budget).unwrap();
        assert_eq!(doc.get(4), Some(&PDFObject::Int(42)));
        assert_eq!(doc.get(5), Some(&PDFObject::String(b"new".to_vec())));

        // Idempotent
        expand_object_streams(&mut doc, &xref, &options, &mut budget).unwrap();
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_non_stream_target_is_skipped() {
        let mut doc = PDFDocument::new("1.5");
        doc.insert(PDFObjRef::new(10, 0), PDFObject::Int(1));
        let mut xref = FxHashMap::default();
        xref.insert(4, XRefEntry::Compressed { stream: 10, index: 0 });
        // A non-stream target is reported as missing and skipped
        let options = UnredactOptions::default();
        let mut budget = Budget::new(None, 1);
        assert!(expand_object_streams(&mut doc, &xref, &options, &mut budget).is_ok());
        assert!(!doc.contains(4));
    }
}
