//! Overlay classification.
//!
//! Decides which drawing operations and annotations of a page exist only
//! to hide text drawn before them. Every rule requires an overlay to fully
//! contain at least one glyph box; partial overlap is never enough.
//! Classification never fails: anything it cannot read is treated as
//! content.

pub mod annots;
pub mod content;

use crate::document::{AnnotRef, PDFDocument, PDFPage};
use crate::geometry::{Rect, intersect_rect, rect_contains};
use crate::interp::{ContentOperator, Step};
use rustc_hash::FxHashSet;
use std::ops::Range;

/// Something to remove from a page.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayMark {
    /// An entry of the page's `/Annots`
    Annotation { page: u32, target: AnnotRef },
    /// Bytes of the page's concatenated content
    ContentRange { page: u32, range: Range<usize> },
}

impl OverlayMark {
    pub const fn page(&self) -> u32 {
        match self {
            Self::Annotation { page, .. } | Self::ContentRange { page, .. } => *page,
        }
    }
}

/// Lowest fill alpha treated as opaque.
pub const MIN_OPACITY: f64 = 0.9;

/// Everything the rules look at for one page.
pub struct PageContext<'a> {
    pub doc: &'a PDFDocument,
    pub page: &'a PDFPage,
    pub ops: &'a [ContentOperator],
    /// Replay of `ops`, index for index
    pub steps: &'a [Step],
    /// Object numbers of interactive form fields
    pub form_fields: &'a FxHashSet<u32>,
    /// Slack around an overlay when testing containment
    pub margin: f64,
    /// Decoded size limit for appearance streams
    pub limit: usize,
}

/// Run every rule over one page.
pub fn classify_page(cx: &PageContext<'_>) -> Vec<OverlayMark> {
    let mut marks: Vec<OverlayMark> = content::content_overlays(cx)
        .into_iter()
        .map(|range| OverlayMark::ContentRange {
            page: cx.page.pageid,
            range,
        })
        .collect();
    marks.extend(
        annots::annotation_overlays(cx)
            .into_iter()
            .map(|target| OverlayMark::Annotation {
                page: cx.page.pageid,
                target,
            }),
    );
    marks
}

/// `true` when `overlay`, clipped to `clip`, contains one of `glyphs`.
pub fn covers_any(overlay: Rect, clip: Option<Rect>, glyphs: &[Rect], margin: f64) -> bool {
    let visible = match clip {
        Some(clip) => match intersect_rect(overlay, clip) {
            Some(r) => r,
            None => return false,
        },
        None => overlay,
    };
    glyphs.iter().any(|g| rect_contains(visible, *g, margin))
}

/// Object numbers of every field reachable from `/AcroForm /Fields`.
pub fn form_field_ids(doc: &PDFDocument) -> FxHashSet<u32> {
    let mut ids = FxHashSet::default();
    let Some(fields) = doc
        .catalog()
        .ok()
        .and_then(|c| doc.dict_get(c, "AcroForm"))
        .and_then(|a| a.as_dict().ok())
        .and_then(|a| doc.dict_get(a, "Fields"))
        .and_then(|f| f.as_array().ok())
    else {
        return ids;
    };

    let mut stack: Vec<u32> = fields.iter().filter_map(|f| f.as_objref().ok().map(|r| r.objid)).collect();
    while let Some(id) = stack.pop() {
        if !ids.insert(id) {
            continue;
        }
        if let Some(kids) = doc
            .get(id)
            .and_then(|f| f.as_dict().ok())
            .and_then(|f| doc.dict_get(f, "Kids"))
            .and_then(|k| k.as_array().ok())
        {
            stack.extend(kids.iter().filter_map(|k| k.as_objref().ok().map(|r| r.objid)));
        }
    }
    ids
}
