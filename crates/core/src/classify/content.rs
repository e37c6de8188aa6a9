//! Opaque rectangles and images drawn over earlier text.

use super::{MIN_OPACITY, PageContext, covers_any};
use crate::geometry::{Rect, apply_matrix_rect, is_axis_aligned, normalize_rect};
use crate::interp::{ContentOperator, GraphicsState, Step};
use crate::interp::interpreter::nums;
use crate::model::{PDFDict, PDFObject};
use crate::parser::Keyword;
use std::ops::Range;
use tracing::debug;

/// `re` subpaths of the path under construction.
#[derive(Default)]
struct RectPath {
    /// Operator index and page-space box of each rectangle
    rects: Vec<(usize, Rect)>,
    /// The path has a segment that is not an axis-aligned rectangle
    irregular: bool,
    /// `W`/`W*` applies to the path
    clipping: bool,
}

impl RectPath {
    fn push_re(&mut self, index: usize, op: &ContentOperator, state: &GraphicsState) {
        match nums::<4>(&op.operands) {
            Some([x, y, w, h]) if is_axis_aligned(state.ctm) => {
                let rect = normalize_rect((x, y, x + w, y + h));
                self.rects.push((index, apply_matrix_rect(state.ctm, rect)));
            }
            _ => self.irregular = true,
        }
    }

    fn clear(&mut self) {
        self.rects.clear();
        self.irregular = false;
        self.clipping = false;
    }
}

/// Fill operators that paint a rectangle path without closing strokes.
const fn is_plain_fill(kw: &Keyword) -> bool {
    matches!(
        kw,
        Keyword::F | Keyword::Ff | Keyword::FStar | Keyword::B | Keyword::BStar
    )
}

/// Operators that change state but draw nothing.
fn is_state_only(kw: &Keyword) -> bool {
    matches!(
        kw,
        Keyword::Cm
            | Keyword::Ww
            | Keyword::J
            | Keyword::Jj
            | Keyword::M
            | Keyword::D
            | Keyword::Ri
            | Keyword::I
            | Keyword::Gs
            | Keyword::CS
            | Keyword::Cs
            | Keyword::SC
            | Keyword::SCN
            | Keyword::Sc
            | Keyword::Scn
            | Keyword::G
            | Keyword::Gg
            | Keyword::RG
            | Keyword::Rg
            | Keyword::K
            | Keyword::Kk
            | Keyword::MP
            | Keyword::DP
    )
}

/// Matching `q`/`Q` pairs.
struct SaveBlocks {
    /// Innermost `q` open at each operator
    enclosing: Vec<Option<usize>>,
    /// Matching `Q` of each `q`
    closing: Vec<Option<usize>>,
}

impl SaveBlocks {
    fn new(ops: &[ContentOperator]) -> Self {
        let mut enclosing = Vec::with_capacity(ops.len());
        let mut closing = vec![None; ops.len()];
        let mut open: Vec<usize> = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            match op.op {
                Keyword::Qq => {
                    enclosing.push(open.last().copied());
                    open.push(i);
                }
                Keyword::Q => {
                    if let Some(q) = open.pop() {
                        closing[q] = Some(i);
                    }
                    enclosing.push(open.last().copied());
                }
                _ => enclosing.push(open.last().copied()),
            }
        }
        Self { enclosing, closing }
    }

    /// Bytes of the `q ... Q` block around `index` when the block holds
    /// nothing but state operators and that one operator.
    fn removable_block(&self, ops: &[ContentOperator], index: usize) -> Option<Range<usize>> {
        let start = self.enclosing[index]?;
        let end = self.closing[start]?;
        let mut marked_depth = 0i32;
        for (k, op) in ops.iter().enumerate().take(end).skip(start + 1) {
            if k == index {
                continue;
            }
            match op.op {
                Keyword::BMC | Keyword::BDC => marked_depth += 1,
                Keyword::EMC => {
                    marked_depth -= 1;
                    if marked_depth < 0 {
                        return None;
                    }
                }
                ref kw if is_state_only(kw) => {}
                _ => return None,
            }
        }
        (marked_depth == 0).then(|| ops[start].range.start..ops[end].range.end)
    }
}

/// `true` for image dictionaries without a soft mask or colour-key mask.
fn is_unmasked_image(dict: &PDFDict) -> bool {
    !dict.contains_key("SMask") && !dict.contains_key("Mask")
}

fn is_stencil(dict: &PDFDict, inline: bool) -> bool {
    let key = dict
        .get("ImageMask")
        .or_else(|| inline.then(|| dict.get("IM")).flatten());
    matches!(key, Some(PDFObject::Bool(true)))
}

/// Byte ranges of the page's content that only hide earlier text.
pub fn content_overlays(cx: &PageContext<'_>) -> Vec<Range<usize>> {
    let ops = cx.ops;
    let blocks = SaveBlocks::new(ops);
    let mut earlier: Vec<Rect> = Vec::new();
    let mut path = RectPath::default();
    let mut marked = Vec::new();

    for (i, (op, step)) in ops.iter().zip(cx.steps).enumerate() {
        match &op.op {
            Keyword::Re => path.push_re(i, op, &step.state),
            Keyword::Mm | Keyword::L | Keyword::C | Keyword::V | Keyword::Y => path.irregular = true,
            Keyword::WClip | Keyword::WStar => path.clipping = true,
            kw if is_plain_fill(kw) => {
                marked.extend(opaque_fill(cx, &path, i, step, &earlier));
                path.clear();
            }
            kw if kw.is_path_paint() => path.clear(),
            Keyword::Do => {
                if image_covers(cx, op, step, &earlier) {
                    debug!(page = cx.page.pageid, op = i, "image XObject covers text");
                    marked.push(blocks.removable_block(ops, i).unwrap_or_else(|| op.range.clone()));
                }
            }
            Keyword::BI => {
                if inline_image_covers(cx, op, step, &earlier) {
                    debug!(page = cx.page.pageid, op = i, "inline image covers text");
                    marked.push(blocks.removable_block(ops, i).unwrap_or_else(|| op.range.clone()));
                }
            }
            _ => {}
        }
        earlier.extend_from_slice(&step.glyphs);
    }
    marked
}

/// Rule for opaque rectangle fills: covering `re` operators, plus the
/// fill when every rectangle of the path covers.
fn opaque_fill(
    cx: &PageContext<'_>,
    path: &RectPath,
    fill: usize,
    step: &Step,
    earlier: &[Rect],
) -> Vec<Range<usize>> {
    let state = &step.state;
    if path.irregular
        || path.clipping
        || path.rects.is_empty()
        || !state.fill_color.is_flat()
        || state.fill_alpha < MIN_OPACITY
    {
        return Vec::new();
    }
    let covering: Vec<usize> = path
        .rects
        .iter()
        .filter(|(_, rect)| covers_any(*rect, state.clip, earlier, cx.margin))
        .map(|(index, _)| *index)
        .collect();
    if covering.is_empty() {
        return Vec::new();
    }
    debug!(
        page = cx.page.pageid,
        op = fill,
        rects = covering.len(),
        of = path.rects.len(),
        "opaque fill covers text"
    );
    let whole = covering.len() == path.rects.len();
    let mut ranges: Vec<Range<usize>> = covering.iter().map(|&k| cx.ops[k].range.clone()).collect();
    if whole {
        ranges.push(cx.ops[fill].range.clone());
    }
    ranges
}

/// `true` when the image's unit square, as placed, hides earlier text.
fn unit_square_covers(cx: &PageContext<'_>, state: &GraphicsState, stencil: bool, earlier: &[Rect]) -> bool {
    if !is_axis_aligned(state.ctm) || state.fill_alpha < MIN_OPACITY {
        return false;
    }
    if stencil && !state.fill_color.is_flat() {
        return false;
    }
    let placed = apply_matrix_rect(state.ctm, (0.0, 0.0, 1.0, 1.0));
    covers_any(placed, state.clip, earlier, cx.margin)
}

fn image_covers(cx: &PageContext<'_>, op: &ContentOperator, step: &Step, earlier: &[Rect]) -> bool {
    let doc = cx.doc;
    let Some(name) = op.operands.last().and_then(|n| n.as_name().ok()) else {
        return false;
    };
    let Some(PDFObject::Stream(xobj)) = cx
        .page
        .resources(doc)
        .and_then(|res| doc.dict_get(res, "XObject"))
        .and_then(|x| x.as_dict().ok())
        .and_then(|x| x.get(name))
        .map(|x| doc.resolve(x))
    else {
        return false;
    };
    xobj.get("Subtype").is_some_and(|s| s.is_name("Image"))
        && is_unmasked_image(&xobj.attrs)
        && unit_square_covers(cx, &step.state, is_stencil(&xobj.attrs, false), earlier)
}

fn inline_image_covers(cx: &PageContext<'_>, op: &ContentOperator, step: &Step, earlier: &[Rect]) -> bool {
    op.inline_image_dict().is_some_and(|dict| {
        is_unmasked_image(dict) && unit_square_covers(cx, &step.state, is_stencil(dict, true), earlier)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PDFDocument, PDFPage};
    use crate::geometry::MATRIX_IDENTITY;
    use crate::interp::{PageInterpreter, parse_content};
    use crate::model::{PDFObjRef, PDFStream};
    use rustc_hash::FxHashSet;

    fn page(resources: PDFDict) -> PDFPage {
        let mut attrs = PDFDict::new();
        attrs.insert("Resources".into(), PDFObject::Dict(resources));
        PDFPage {
            pageid: 3,
            attrs,
            mediabox: Some((0.0, 0.0, 612.0, 792.0)),
            cropbox: None,
            rotate: 0,
            contents: Vec::new(),
            annots: Vec::new(),
        }
    }

    fn removed(doc: &PDFDocument, page: &PDFPage, data: &[u8]) -> Vec<String> {
        let ops = parse_content(data).unwrap();
        let steps = PageInterpreter::new(doc, page.resources(doc), 1 << 20)
            .replay(&ops, MATRIX_IDENTITY)
            .unwrap();
        let fields = FxHashSet::default();
        let cx = PageContext {
            doc,
            page,
            ops: &ops,
            steps: &steps,
            form_fields: &fields,
            margin: 1.5,
            limit: 1 << 20,
        };
        content_overlays(&cx)
            .into_iter()
            .map(|r| String::from_utf8_lossy(&data[r]).into_owned())
            .collect()
    }

    const TEXT: &[u8] = b"BT /F1 12 Tf 1 0 0 1 100 700 Tm (SECRET) Tj ET\n";

    fn with_text(tail: &[u8]) -> Vec<u8> {
        [TEXT, tail].concat()
    }

    #[test]
    fn test_black_box_over_text() {
        let doc = PDFDocument::new("1.7");
        let page = page(PDFDict::new());
        let data = with_text(b"0 0 0 rg 95 690 60 25 re f");
        assert_eq!(removed(&doc, &page, &data), ["95 690 60 25 re", "f"]);
    }

    #[test]
    fn test_box_drawn_before_text_is_kept() {
        let doc = PDFDocument::new("1.7");
        let page = page(PDFDict::new());
        let data = b"0 g 95 690 60 25 re f BT /F1 12 Tf 1 0 0 1 100 700 Tm (SECRET) Tj ET";
        assert!(removed(&doc, &page, data).is_empty());
    }

    #[test]
    fn test_border_not_covering_text_is_kept() {
        let doc = PDFDocument::new("1.7");
        let page = page(PDFDict::new());
        let data = with_text(b"0 g 0 0 612 2 re f 90 695 10 10 re f");
        assert!(removed(&doc, &page, &data).is_empty());
    }

    #[test]
    fn test_mixed_path_keeps_fill() {
        let doc = PDFDocument::new("1.7");
        let page = page(PDFDict::new());
        let data = with_text(b"0 g 95 690 60 25 re 0 0 10 10 re f");
        assert_eq!(removed(&doc, &page, &data), ["95 690 60 25 re"]);
    }

    #[test]
    fn test_translucent_or_pattern_fill_is_kept() {
        let mut doc = PDFDocument::new("1.7");
        let mut gs = PDFDict::new();
        gs.insert("ca".into(), PDFObject::Real(0.5));
        doc.insert(PDFObjRef::new(9, 0), PDFObject::Dict(gs));
        let mut ext = PDFDict::new();
        ext.insert("GS1".into(), PDFObject::Ref(PDFObjRef::new(9, 0)));
        let mut res = PDFDict::new();
        res.insert("ExtGState".into(), PDFObject::Dict(ext));
        let page = page(res);

        let data = with_text(b"/GS1 gs 95 690 60 25 re f");
        assert!(removed(&doc, &page, &data).is_empty());
        let data = with_text(b"/Pattern cs /P1 scn 95 690 60 25 re f");
        assert!(removed(&doc, &page, &data).is_empty());
    }

    #[test]
    fn test_curved_path_is_kept() {
        let doc = PDFDocument::new("1.7");
        let page = page(PDFDict::new());
        let data = with_text(b"95 690 m 155 690 l 155 715 l 95 715 l h f");
        assert!(removed(&doc, &page, &data).is_empty());
    }

    #[test]
    fn test_clip_limits_coverage() {
        let doc = PDFDocument::new("1.7");
        let page = page(PDFDict::new());
        let data = with_text(b"q 0 0 50 50 re W n 95 690 60 25 re f Q");
        assert!(removed(&doc, &page, &data).is_empty());
    }

    fn image_doc(extra: Option<(&str, PDFObject)>) -> (PDFDocument, PDFPage) {
        let mut doc = PDFDocument::new("1.7");
        let mut attrs = PDFDict::new();
        attrs.insert("Subtype".into(), PDFObject::Name("Image".into()));
        if let Some((k, v)) = extra {
            attrs.insert(k.into(), v);
        }
        doc.insert(
            PDFObjRef::new(8, 0),
            PDFObject::Stream(Box::new(PDFStream::new(attrs, b"\x00".to_vec()))),
        );
        let mut xobjects = PDFDict::new();
        xobjects.insert("Im1".into(), PDFObject::Ref(PDFObjRef::new(8, 0)));
        let mut res = PDFDict::new();
        res.insert("XObject".into(), PDFObject::Dict(xobjects));
        (doc, page(res))
    }

    #[test]
    fn test_image_block_removed_whole() {
        let (doc, page) = image_doc(None);
        let data = with_text(b"q 60 0 0 25 95 690 cm /Im1 Do Q");
        assert_eq!(removed(&doc, &page, &data), ["q 60 0 0 25 95 690 cm /Im1 Do Q"]);
    }

    #[test]
    fn test_image_in_busy_block_removes_only_do() {
        let (doc, page) = image_doc(None);
        let data = with_text(b"q 60 0 0 25 95 690 cm /Im1 Do 0 0 1 1 re S Q");
        assert_eq!(removed(&doc, &page, &data), ["/Im1 Do"]);
    }

    #[test]
    fn test_soft_masked_image_is_kept() {
        let (doc, page) = image_doc(Some(("SMask", PDFObject::Ref(PDFObjRef::new(4, 0)))));
        let data = with_text(b"q 60 0 0 25 95 690 cm /Im1 Do Q");
        assert!(removed(&doc, &page, &data).is_empty());
    }

    #[test]
    fn test_inline_image_over_text() {
        let doc = PDFDocument::new("1.7");
        let page = page(PDFDict::new());
        let data = with_text(b"q 60 0 0 25 95 690 cm BI /W 1 /H 1 /CS /G /BPC 8 ID \x00 EI Q");
        assert_eq!(removed(&doc, &page, &data).len(), 1);
    }
}
