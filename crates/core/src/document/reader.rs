//! Container reader: bytes to [`PDFDocument`].
//!
//! Locates `startxref`, follows the xref chain (classic tables, xref streams,
//! hybrid `/XRefStm`, incremental `/Prev` updates), then materializes every
//! in-use object eagerly.

use super::catalog::PDFDocument;
use super::objstm::expand_object_streams;
use super::repair::rebuild_xref;
use super::xref::{XRef, XRefEntry, merge_sections, parse_classic, parse_stream};
use crate::api::UnredactOptions;
use crate::error::{PdfError, Result};
use crate::limits::{Budget, ensure_within};
use crate::model::{PDFObjRef, PDFObject, PDFStream};
use crate::parser::{Keyword, PDFParser, Token};
use bytes::Bytes;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

/// How far into the file the `%PDF-` header may start.
const HEADER_WINDOW: usize = 1024;
/// How far from the end `startxref` is searched for.
const STARTXREF_WINDOW: usize = 1024;
/// Objects materialized between cancellation checks.
const CHECKPOINT_INTERVAL: usize = 256;

/// Parse a whole document from `data`.
pub fn read_document(data: Bytes, options: &UnredactOptions) -> Result<PDFDocument> {
    let version = parse_header(&data)?;
    check_version(&version, options.max_pdf_version)?;

    let startxref = find_startxref(&data)
        .ok_or_else(|| PdfError::MalformedContainer("missing startxref".into()))?;

    let sections = match load_xrefs(&data, startxref, options) {
        Ok(sections) => sections,
        Err(err) if options.recover_xref && !err.kind().is_resource_limit() => {
            warn!(error = %err, "xref chain unreadable, rebuilding index by scanning");
            vec![rebuild_xref(&data)?]
        }
        Err(err) => return Err(err),
    };

    // Refuse encrypted input before touching any object payload
    if sections.iter().any(|x| x.trailer.contains_key("Encrypt")) {
        return Err(PdfError::EncryptedDocument);
    }

    let merged = merge_sections(&sections);
    let in_use = merged
        .values()
        .filter(|e| !matches!(e, XRefEntry::Free { .. }))
        .count();
    ensure_within("object count", in_use, options.max_objects)?;
    debug!(sections = sections.len(), objects = in_use, "xref index loaded");

    let mut doc = PDFDocument::new(version);
    let mut budget = Budget::new(options.cancellation.clone(), CHECKPOINT_INTERVAL);

    let mut objids: Vec<u32> = merged.keys().copied().collect();
    objids.sort_unstable();
    for objid in objids {
        budget.tick()?;
        match merged[&objid] {
            XRefEntry::InFile { offset, genno } => {
                let obj = parse_object_at(&data, offset, objid, &|r| resolve_length(&data, &merged, r))?;
                doc.insert(PDFObjRef::new(objid, genno), obj);
            }
            XRefEntry::Free { next_gen } => doc.mark_free(objid, next_gen),
            XRefEntry::Compressed { .. } => {}
        }
    }

    expand_object_streams(&mut doc, &merged, options, &mut budget)?;
    ensure_within("object count", doc.len(), options.max_objects)?;

    build_trailer(&mut doc, &sections);
    if sections.iter().all(|x| x.is_fallback) && !doc.trailer().contains_key("Root") {
        adopt_catalog(&mut doc);
    }

    let pruned = doc.normalize_dangling_refs();
    if pruned > 0 {
        warn!(count = pruned, "dropped references to missing objects");
    }

    doc.root_ref()?;
    Ok(doc)
}

/// Find `%PDF-M.m` in the first kilobyte and return "M.m".
fn parse_header(data: &[u8]) -> Result<String> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let start = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| PdfError::MalformedContainer("no %PDF- header".into()))?;
    let version: String = data[start + 5..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| b as char)
        .collect();
    if version.is_empty() {
        return Err(PdfError::MalformedContainer("header has no version".into()));
    }
    Ok(version)
}

fn check_version(version: &str, max: f32) -> Result<()> {
    let value: f32 = version
        .parse()
        .map_err(|_| PdfError::MalformedContainer(format!("bad header version {version:?}")))?;
    if value > max + f32::EPSILON {
        return Err(PdfError::UnsupportedFeature(format!(
            "PDF version {version} is newer than {max:.1}"
        )));
    }
    Ok(())
}

/// Offset recorded after the last `startxref` in the trailing window.
pub(crate) fn find_startxref(data: &[u8]) -> Option<usize> {
    let needle = b"startxref";
    let search_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let hay = &data[search_start..];
    let found = hay.windows(needle.len()).rposition(|w| w == needle)?;

    let rest = &hay[found + needle.len()..];
    let digits: Vec<u8> = rest
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    std::str::from_utf8(&digits).ok()?.parse().ok()
}

/// Load xref sections starting at `pos`, newest first.
fn load_xrefs(data: &Bytes, mut pos: usize, options: &UnredactOptions) -> Result<Vec<XRef>> {
    let mut sections = Vec::new();
    let mut visited = FxHashSet::default();

    while visited.insert(pos) {
        let xref = load_xref_at(data, pos, options)?;
        let prev = xref.prev();

        // Hybrid file: the companion stream is consulted before the table
        if let Some(stm_pos) = xref.xref_stm()
            && visited.insert(stm_pos)
        {
            match load_xref_at(data, stm_pos, options) {
                Ok(stm) => sections.push(stm),
                Err(err) => warn!(offset = stm_pos, error = %err, "ignoring unreadable /XRefStm"),
            }
        }
        sections.push(xref);

        match prev {
            Some(prev_pos) => pos = prev_pos,
            None => break,
        }
    }

    Ok(sections)
}

fn load_xref_at(data: &Bytes, pos: usize, options: &UnredactOptions) -> Result<XRef> {
    if pos >= data.len() {
        return Err(PdfError::MalformedContainer(format!(
            "xref offset {pos} beyond end of file"
        )));
    }
    let start = pos
        + data[pos..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();

    if data[start..].starts_with(b"xref") {
        return parse_classic(data, start);
    }

    // Otherwise an xref stream object
    let obj = parse_object_at(data, start, 0, &|_| None)?;
    let stream = obj
        .as_stream()
        .ok()
        .filter(|s| s.is_type("XRef"))
        .ok_or_else(|| PdfError::MalformedContainer(format!("no xref at offset {pos}")))?;
    parse_stream(&PDFDocument::default(), stream, options.max_content_stream_bytes)
}

/// Resolve an indirect `/Length` by parsing its target straight from the file.
fn resolve_length(data: &Bytes, xref: &FxHashMap<u32, XRefEntry>, r: PDFObjRef) -> Option<i64> {
    match xref.get(&r.objid)? {
        XRefEntry::InFile { offset, .. } => parse_object_at(data, *offset, r.objid, &|_| None)
            .ok()?
            .as_int()
            .ok(),
        _ => None,
    }
}

/// Parse the indirect object `objid G obj ... endobj` at `offset`.
///
/// `objid == 0` accepts any object number. Stream payloads are captured
/// by `/Length` (via `length_of` when indirect) and checked against
/// `endstream`; a mismatch falls back to scanning for `endstream`.
pub(crate) fn parse_object_at(
    data: &Bytes,
    offset: usize,
    objid: u32,
    length_of: &dyn Fn(PDFObjRef) -> Option<i64>,
) -> Result<PDFObject> {
    if offset >= data.len() {
        return Err(PdfError::MalformedContainer(format!(
            "object {objid} offset {offset} exceeds file size {}",
            data.len()
        )));
    }

    let mut parser = PDFParser::at(data, offset);
    let header = (parser.next_token()?, parser.next_token()?, parser.next_token()?);
    match header {
        (Some((_, Token::Int(num))), Some((_, Token::Int(_))), Some((_, Token::Keyword(Keyword::Obj)))) => {
            if objid != 0 && num != i64::from(objid) {
                return Err(PdfError::MalformedContainer(format!(
                    "xref entry for object {objid} points at object {num} (offset {offset})"
                )));
            }
        }
        _ => {
            return Err(PdfError::MalformedContainer(format!(
                "no object header for object {objid} at offset {offset}"
            )));
        }
    }

    let obj = parser.parse_object()?;
    let PDFObject::Dict(mut dict) = obj else {
        return Ok(obj);
    };

    match parser.next_token()? {
        Some((span, Token::Keyword(Keyword::Stream))) => {
            let mut start = span.end;
            if data.get(start) == Some(&b'\r') {
                start += 1;
            }
            if data.get(start) == Some(&b'\n') {
                start += 1;
            }

            let declared = match dict.get("Length") {
                Some(PDFObject::Int(n)) => Some(*n),
                Some(PDFObject::Ref(r)) => length_of(*r),
                _ => None,
            }
            .and_then(|n| usize::try_from(n).ok());

            let end = match declared {
                Some(len) if ends_with_endstream(data, start, len) => start + len,
                _ => {
                    let end = find_endstream(&data[start..]).ok_or_else(|| {
                        PdfError::MalformedContainer(format!("stream {objid} has no endstream"))
                    })?;
                    warn!(objid, declared = ?declared, actual = end, "stream /Length does not match endstream");
                    start + end
                }
            };
            // Length is stored direct so the length object is not kept alive.
            dict.insert("Length".into(), PDFObject::Int((end - start) as i64));

            Ok(PDFObject::Stream(Box::new(PDFStream::new(
                dict,
                data.slice(start..end),
            ))))
        }
        _ => Ok(PDFObject::Dict(dict)),
    }
}

fn ends_with_endstream(data: &[u8], start: usize, len: usize) -> bool {
    let Some(end) = start.checked_add(len).filter(|&e| e <= data.len()) else {
        return false;
    };
    let rest = &data[end..];
    let ws = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
    rest[ws..].starts_with(b"endstream")
}

/// Offset of `endstream` with one preceding end-of-line marker trimmed.
fn find_endstream(data: &[u8]) -> Option<usize> {
    let needle = b"endstream";
    let mut end = data.windows(needle.len()).position(|w| w == needle)?;
    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && data[end - 1] == b'\r' {
        end -= 1;
    }
    Some(end)
}

/// Carry `/Root`, `/Info` and `/ID` from the newest trailer that has them.
fn build_trailer(doc: &mut PDFDocument, sections: &[XRef]) {
    for key in ["Root", "Info", "ID"] {
        if let Some(value) = sections.iter().find_map(|x| x.trailer.get(key)) {
            doc.trailer_mut().insert(key.to_string(), value.clone());
        }
    }
}

/// Recovered files without a trailer: use the first `/Type /Catalog` object.
fn adopt_catalog(doc: &mut PDFDocument) {
    let catalog = doc
        .iter()
        .find(|(_, obj)| matches!(obj, PDFObject::Dict(d) if d.get("Type").is_some_and(|t| t.is_name("Catalog"))))
        .map(|(r, _)| r);
    if let Some(r) = catalog {
        warn!(catalog = %r, "trailer missing, using catalog found by scanning");
        doc.trailer_mut().insert("Root".into(), PDFObject::Ref(r));
    }
}
