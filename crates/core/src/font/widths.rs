//! Glyph width metrics.
//!
//! Only advance widths are needed to estimate where shown text lands on the
//! page, so fonts are reduced to a code -> width table.

use crate::document::PDFDocument;
use crate::model::{PDFDict, PDFObject};
use rustc_hash::FxHashMap;

/// Width used when a font gives none, in 1/1000 em.
pub const DEFAULT_GLYPH_WIDTH: f64 = 500.0;

/// Default `/DW` of a CID font.
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// Width table of one font resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    widths: FxHashMap<u32, f64>,
    default_width: f64,
    /// Glyph-space to text-space factor, times 1000
    scale: f64,
    composite: bool,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            widths: FxHashMap::default(),
            default_width: DEFAULT_GLYPH_WIDTH,
            scale: 1.0,
            composite: false,
        }
    }
}

impl FontMetrics {
    /// Build metrics from a font dictionary.
    pub fn from_dict(doc: &PDFDocument, font: &PDFDict) -> Self {
        let subtype = doc.dict_get(font, "Subtype").and_then(|s| s.as_name().ok());
        if subtype == Some("Type0") {
            return Self::composite(doc, font);
        }

        let mut metrics = Self::default();
        let first_char = doc
            .dict_get(font, "FirstChar")
            .and_then(|v| v.as_int().ok())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        if let Some(PDFObject::Array(widths)) = doc.dict_get(font, "Widths") {
            for (i, w) in widths.iter().enumerate() {
                let code = u32::try_from(i).ok().and_then(|i| first_char.checked_add(i));
                if let (Some(w), Some(code)) = (doc.resolve_num(w), code) {
                    metrics.widths.insert(code, w);
                }
            }
        }
        if let Some(missing) = doc
            .dict_get(font, "FontDescriptor")
            .and_then(|d| d.as_dict().ok())
            .and_then(|d| doc.dict_get(d, "MissingWidth"))
            .and_then(|w| w.as_num().ok())
            .filter(|w| *w > 0.0)
        {
            metrics.default_width = missing;
        }
        // Type3 widths are in glyph space
        if subtype == Some("Type3")
            && let Some(PDFObject::Array(m)) = doc.dict_get(font, "FontMatrix")
            && let Some(a) = m.first().and_then(|a| doc.resolve_num(a))
        {
            metrics.scale = a * 1000.0;
        }
        metrics
    }

    fn composite(doc: &PDFDocument, font: &PDFDict) -> Self {
        let mut metrics = Self {
            default_width: DEFAULT_CID_WIDTH,
            composite: true,
            ..Self::default()
        };
        let Some(descendant) = doc
            .dict_get(font, "DescendantFonts")
            .and_then(|d| d.as_array().ok())
            .and_then(|d| d.first())
            .and_then(|d| doc.resolve_dict(d))
        else {
            return metrics;
        };
        if let Some(dw) = doc.dict_get(descendant, "DW").and_then(|w| w.as_num().ok()) {
            metrics.default_width = dw;
        }
        if let Some(PDFObject::Array(w)) = doc.dict_get(descendant, "W") {
            metrics.widths = cid_widths(doc, w);
        }
        metrics
    }

    /// `true` for Type0 fonts (two-byte codes).
    pub const fn is_composite(&self) -> bool {
        self.composite
    }

    /// Advance width of `code`, in 1/1000 em.
    pub fn width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width) * self.scale
    }

    /// Split a shown string into character codes.
    pub fn codes<'s>(&self, s: &'s [u8]) -> impl Iterator<Item = u32> + 's {
        let step = if self.composite { 2 } else { 1 };
        s.chunks(step)
            .map(|c| c.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }
}

/// Parse a CID `/W` array.
///
/// Handles both forms:
/// - `c [w1 w2 ...]` - consecutive widths starting at c
/// - `c_first c_last w` - one width for a range
fn cid_widths(doc: &PDFDocument, seq: &[PDFObject]) -> FxHashMap<u32, f64> {
    /// Largest range expanded from one `/W` entry.
    const MAX_RANGE: u32 = 0x1_0000;

    let mut widths = FxHashMap::default();
    let mut pending: Vec<f64> = Vec::with_capacity(3);

    for v in seq {
        match doc.resolve(v) {
            PDFObject::Array(arr) => {
                if let [start] = pending.as_slice() {
                    let start = *start as u32;
                    for (i, w) in arr.iter().enumerate() {
                        let cid = u32::try_from(i).ok().and_then(|i| start.checked_add(i));
                        if let (Some(w), Some(cid)) = (doc.resolve_num(w), cid) {
                            widths.insert(cid, w);
                        }
                    }
                }
                pending.clear();
            }
            other => {
                let Ok(n) = other.as_num() else {
                    pending.clear();
                    continue;
                };
                pending.push(n);
                if let [first, last, w] = pending[..] {
                    let (first, last) = (first as u32, last as u32);
                    for cid in first..=last.min(first.saturating_add(MAX_RANGE)) {
                        widths.insert(cid, w);
                    }
                    pending.clear();
                }
            }
        }
    }
    widths
}
