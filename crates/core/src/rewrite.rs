//! Graph rewriting: applies overlay marks to the object table and drops
//! whatever is no longer reachable.

use crate::classify::OverlayMark;
use crate::codec::flate_encode;
use crate::document::{AnnotRef, PDFDocument, PDFPage};
use crate::error::{PdfError, Result};
use crate::interp::parse_content;
use crate::model::{PDFDict, PDFObject, PDFStream};
use crate::parser::Keyword;
use rustc_hash::FxHashSet;
use std::ops::Range;
use tracing::{debug, warn};

/// Counts of what one page lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageEdit {
    pub annotations_removed: usize,
    pub content_ranges_removed: usize,
}

/// Cut marked ranges out of `content` (the page's concatenated, decoded
/// content) and marked entries out of `/Annots`.
///
/// Spliced content is stored as a new Flate stream and becomes the page's
/// only content stream; the old streams are left to [`sweep`]. XObjects
/// whose every `Do` was cut are dropped from a page-local copy of the
/// resources so that they can be swept too.
pub fn rewrite_page(
    doc: &mut PDFDocument,
    page: &PDFPage,
    content: &[u8],
    marks: &[OverlayMark],
) -> Result<PageEdit> {
    let mut ranges = Vec::new();
    let mut targets = FxHashSet::default();
    for mark in marks.iter().filter(|m| m.page() == page.pageid) {
        match mark {
            OverlayMark::ContentRange { range, .. } => ranges.push(range.clone()),
            OverlayMark::Annotation { target, .. } => {
                targets.insert(*target);
            }
        }
    }

    let mut edit = PageEdit::default();
    if !ranges.is_empty() {
        let ranges = merge_ranges(ranges, content.len());
        edit.content_ranges_removed = ranges.len();
        let spliced = splice(content, &ranges);
        let mut attrs = PDFDict::new();
        attrs.insert("Filter".into(), PDFObject::Name("FlateDecode".into()));
        let stream = PDFStream::new(attrs, flate_encode(&spliced)?);
        let new_ref = doc.add(PDFObject::Stream(Box::new(stream)));
        page_dict_mut(doc, page.pageid)?.insert("Contents".into(), PDFObject::Ref(new_ref));
        debug!(page = page.pageid, ranges = edit.content_ranges_removed, contents = %new_ref, "content rewritten");

        let unused = unused_xobjects(content, &ranges, &spliced);
        if !unused.is_empty() {
            prune_xobjects(doc, page, &unused)?;
        }
    }
    if !targets.is_empty() {
        edit.annotations_removed = remove_annotations(doc, page.pageid, &targets)?;
    }
    Ok(edit)
}

fn page_dict_mut(doc: &mut PDFDocument, pageid: u32) -> Result<&mut PDFDict> {
    doc.get_mut(pageid)
        .and_then(|p| p.as_dict_mut().ok())
        .ok_or_else(|| PdfError::InternalInvariantViolation(format!("page {pageid} vanished during rewrite")))
}

/// Sort, clamp and coalesce overlapping ranges.
fn merge_ranges(mut ranges: Vec<Range<usize>>, len: usize) -> Vec<Range<usize>> {
    ranges.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for r in ranges {
        let r = r.start.min(len)..r.end.min(len);
        if r.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}

/// Replace each range with one space so neighbouring tokens stay apart.
fn splice(content: &[u8], ranges: &[Range<usize>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut pos = 0;
    for r in ranges {
        out.extend_from_slice(&content[pos..r.start]);
        out.push(b' ');
        pos = r.end;
    }
    out.extend_from_slice(&content[pos..]);
    out
}

/// Names of XObjects invoked only from removed ranges.
fn unused_xobjects(content: &[u8], removed: &[Range<usize>], spliced: &[u8]) -> Vec<String> {
    let (Ok(before), Ok(after)) = (parse_content(content), parse_content(spliced)) else {
        return Vec::new();
    };
    let xobject_name = |op: &crate::interp::ContentOperator| -> Option<String> {
        (op.op == Keyword::Do)
            .then(|| op.operands.last().and_then(|n| n.as_name().ok()).map(str::to_string))
            .flatten()
    };
    let kept: FxHashSet<String> = after.iter().filter_map(xobject_name).collect();
    let mut unused: Vec<String> = Vec::new();
    for op in &before {
        let cut = removed.iter().any(|r| r.start <= op.range.start && op.range.end <= r.end);
        if let Some(name) = xobject_name(op).filter(|_| cut)
            && !kept.contains(&name)
            && !unused.contains(&name)
        {
            unused.push(name);
        }
    }
    unused
}

/// Give the page its own `/Resources` without the named XObjects.
///
/// Shared or inherited resource dictionaries are copied, never edited.
fn prune_xobjects(doc: &mut PDFDocument, page: &PDFPage, names: &[String]) -> Result<()> {
    let Some(mut resources) = page.resources(doc).cloned() else {
        return Ok(());
    };
    let Some(mut xobjects) = resources.get("XObject").and_then(|x| doc.resolve_dict(x)).cloned() else {
        return Ok(());
    };
    for name in names {
        xobjects.shift_remove(name.as_str());
    }
    resources.insert("XObject".into(), PDFObject::Dict(xobjects));
    page_dict_mut(doc, page.pageid)?.insert("Resources".into(), PDFObject::Dict(resources));
    debug!(page = page.pageid, xobjects = ?names, "unused XObjects dropped from resources");
    Ok(())
}

fn remove_annotations(doc: &mut PDFDocument, pageid: u32, targets: &FxHashSet<AnnotRef>) -> Result<usize> {
    let entries: Vec<PDFObject> = {
        let page = page_dict_mut(doc, pageid)?;
        let Some(annots) = page.get("Annots").cloned() else {
            return Ok(0);
        };
        match doc.resolve(&annots) {
            PDFObject::Array(arr) => arr.clone(),
            _ => return Ok(0),
        }
    };

    let before = entries.len();
    let kept: Vec<PDFObject> = entries
        .into_iter()
        .enumerate()
        .filter(|(index, entry)| {
            let key = match entry {
                PDFObject::Ref(r) => targets.iter().any(|t| matches!(t, AnnotRef::Indirect(m) if m.objid == r.objid)),
                _ => targets.contains(&AnnotRef::Inline(*index)),
            };
            !key
        })
        .map(|(_, entry)| entry)
        .collect();
    let removed = before - kept.len();

    let page = page_dict_mut(doc, pageid)?;
    if kept.is_empty() {
        page.shift_remove("Annots");
    } else {
        page.insert("Annots".into(), PDFObject::Array(kept));
    }
    debug!(page = pageid, removed, "annotations removed");
    Ok(removed)
}

/// Delete every object unreachable from the trailer's `/Root` and `/Info`.
///
/// Returns how many objects were deleted. A kept object that still refers
/// to a deleted one is an [`PdfError::InternalInvariantViolation`].
pub fn sweep(doc: &mut PDFDocument) -> Result<usize> {
    let mut reachable: FxHashSet<u32> = FxHashSet::default();
    let mut pending: Vec<u32> = Vec::new();
    for key in ["Root", "Info"] {
        if let Some(obj) = doc.trailer().get(key) {
            obj.for_each_ref(&mut |r| pending.push(r.objid));
        }
    }
    while let Some(id) = pending.pop() {
        if !reachable.insert(id) {
            continue;
        }
        match doc.get(id) {
            Some(obj) => obj.for_each_ref(&mut |r| {
                if !reachable.contains(&r.objid) {
                    pending.push(r.objid);
                }
            }),
            None => warn!(objid = id, "reference to missing object"),
        }
    }

    let unreachable: Vec<u32> = doc
        .objids()
        .into_iter()
        .filter(|id| !reachable.contains(id))
        .collect();
    for &id in &unreachable {
        doc.remove(id);
    }

    let deleted: FxHashSet<u32> = unreachable.iter().copied().collect();
    let mut dangling = None;
    for (r, obj) in doc.iter() {
        obj.for_each_ref(&mut |target| {
            if dangling.is_none() && deleted.contains(&target.objid) {
                dangling = Some((r.objid, target.objid));
            }
        });
    }
    if let Some((from, to)) = dangling {
        return Err(PdfError::InternalInvariantViolation(format!(
            "object {from} refers to deleted object {to}"
        )));
    }
    debug!(swept = unreachable.len(), kept = doc.len(), "unreachable objects removed");
    Ok(unreachable.len())
}
