//! Annotations whose only effect is to hide text under them.

use super::{MIN_OPACITY, PageContext, covers_any};
use crate::document::{AnnotRef, PDFDocument};
use crate::geometry::{MATRIX_IDENTITY, Rect, normalize_rect};
use crate::interp::{ContentOperator, PageInterpreter, Step, parse_content};
use crate::model::{PDFDict, PDFObject, PDFStream};
use crate::parser::Keyword;
use rustc_hash::FxHashSet;
use tracing::debug;

/// Subtypes that can act as an overlay.
const OVERLAY_SUBTYPES: &[&str] = &[
    "Square", "FreeText", "Widget", "Redact", "Stamp", "Polygon", "Ink", "Highlight",
];

/// Free-form markup subtypes; judged by their colour rather than the
/// shape their appearance paints.
const MARKER_SUBTYPES: &[&str] = &["Polygon", "Ink", "Highlight"];

/// Largest component distance from black still treated as black.
const BLACK_TOLERANCE: f64 = 0.02;

/// Annotation flag bits (`/F`).
const FLAG_HIDDEN: i64 = 1 << 1;
const FLAG_NOVIEW: i64 = 1 << 5;

/// Normal appearance of an annotation.
enum Appearance<'a> {
    /// No `/AP` at all
    Missing,
    /// `/AP` present but no stream applies to the current state
    Unusable,
    Stream(&'a PDFStream),
}

/// Annotations of the page to remove, including popups of removed ones.
pub fn annotation_overlays(cx: &PageContext<'_>) -> Vec<AnnotRef> {
    let doc = cx.doc;
    let glyphs: Vec<Rect> = cx.steps.iter().flat_map(|s| s.glyphs.iter().copied()).collect();
    if glyphs.is_empty() {
        return Vec::new();
    }

    let mut marked: Vec<AnnotRef> = Vec::new();
    for &target in &cx.page.annots {
        let Some(annot) = cx.page.annot_dict(doc, target) else {
            continue;
        };
        if is_overlay(cx, target, annot, &glyphs) {
            debug!(page = cx.page.pageid, annot = ?target, "annotation covers text");
            marked.push(target);
        }
    }
    if marked.is_empty() {
        return marked;
    }

    // Popups belong to the annotation they pop up from.
    let mut owners: FxHashSet<u32> = FxHashSet::default();
    let mut popups: FxHashSet<u32> = FxHashSet::default();
    for &target in &marked {
        if let AnnotRef::Indirect(r) = target {
            owners.insert(r.objid);
        }
        if let Some(PDFObject::Ref(p)) = cx.page.annot_dict(doc, target).and_then(|a| a.get("Popup")) {
            popups.insert(p.objid);
        }
    }
    let mut attached = Vec::new();
    for &target in &cx.page.annots {
        if marked.contains(&target) {
            continue;
        }
        let Some(annot) = cx.page.annot_dict(doc, target) else {
            continue;
        };
        if !subtype(doc, annot).is_some_and(|s| s == "Popup") {
            continue;
        }
        let parent = matches!(annot.get("Parent"), Some(PDFObject::Ref(p)) if owners.contains(&p.objid));
        let listed = matches!(target, AnnotRef::Indirect(r) if popups.contains(&r.objid));
        if parent || listed {
            attached.push(target);
        }
    }
    marked.extend(attached);
    marked
}

fn subtype<'a>(doc: &'a PDFDocument, annot: &'a PDFDict) -> Option<&'a str> {
    doc.dict_get(annot, "Subtype").and_then(|s| s.as_name().ok())
}

fn is_overlay(cx: &PageContext<'_>, target: AnnotRef, annot: &PDFDict, glyphs: &[Rect]) -> bool {
    let doc = cx.doc;
    let Some(kind) = subtype(doc, annot).filter(|s| OVERLAY_SUBTYPES.contains(s)) else {
        return false;
    };

    let flags = doc.dict_get(annot, "F").and_then(|f| f.as_int().ok()).unwrap_or(0);
    if flags & (FLAG_HIDDEN | FLAG_NOVIEW) != 0 {
        return false;
    }
    let opacity = doc
        .dict_get(annot, "CA")
        .or_else(|| doc.dict_get(annot, "ca"))
        .and_then(|ca| doc.resolve_num(ca))
        .unwrap_or(1.0);
    if opacity < MIN_OPACITY {
        return false;
    }
    if kind == "Widget" && is_form_field(cx, target, annot) {
        return false;
    }

    let Some(rect) = annot_rect(doc, annot) else {
        return false;
    };
    if !covers_any(rect, None, glyphs, cx.margin) {
        return false;
    }

    if MARKER_SUBTYPES.contains(&kind) {
        return is_black(doc, annot)
            && match normal_appearance(doc, annot) {
                Appearance::Stream(stream) => !shows_text(cx, stream),
                Appearance::Missing => true,
                Appearance::Unusable => false,
            };
    }
    match normal_appearance(doc, annot) {
        Appearance::Stream(stream) => paints_one_solid_shape(cx, stream),
        Appearance::Unusable => false,
        Appearance::Missing => match kind {
            "Square" | "Redact" => has_interior_color(doc, annot),
            "Stamp" => is_black(doc, annot),
            _ => false,
        },
    }
}

fn is_form_field(cx: &PageContext<'_>, target: AnnotRef, annot: &PDFDict) -> bool {
    ["FT", "T", "Parent"].iter().any(|k| annot.contains_key(*k))
        || matches!(target, AnnotRef::Indirect(r) if cx.form_fields.contains(&r.objid))
}

fn annot_rect(doc: &PDFDocument, annot: &PDFDict) -> Option<Rect> {
    let arr = doc.dict_get(annot, "Rect")?.as_array().ok()?;
    let vals: Vec<f64> = arr.iter().filter_map(|v| doc.resolve_num(v)).collect();
    match vals.as_slice() {
        &[x0, y0, x1, y1] => Some(normalize_rect((x0, y0, x1, y1))),
        _ => None,
    }
}

/// `/IC` with at least one component; an empty array means transparent.
fn has_interior_color(doc: &PDFDocument, annot: &PDFDict) -> bool {
    doc.dict_get(annot, "IC")
        .and_then(|ic| ic.as_array().ok())
        .is_some_and(|ic| !ic.is_empty() && ic.iter().all(|c| doc.resolve_num(c).is_some()))
}

/// `/IC`, or `/C` when there is no interior colour, is black.
fn is_black(doc: &PDFDocument, annot: &PDFDict) -> bool {
    let color = ["IC", "C"]
        .iter()
        .filter_map(|key| doc.dict_get(annot, key)?.as_array().ok())
        .find(|c| !c.is_empty());
    let Some(comps) = color.and_then(|c| c.iter().map(|v| doc.resolve_num(v)).collect::<Option<Vec<_>>>())
    else {
        return false;
    };
    match comps.as_slice() {
        // CMYK
        &[_, _, _, k] => k >= 1.0 - BLACK_TOLERANCE,
        _ => comps.iter().all(|v| *v <= BLACK_TOLERANCE),
    }
}

fn normal_appearance<'a>(doc: &'a PDFDocument, annot: &'a PDFDict) -> Appearance<'a> {
    let Some(ap) = doc.dict_get(annot, "AP") else {
        return Appearance::Missing;
    };
    let Some(normal) = ap.as_dict().ok().and_then(|ap| doc.dict_get(ap, "N")) else {
        return Appearance::Unusable;
    };
    match normal {
        PDFObject::Stream(stream) => Appearance::Stream(stream),
        PDFObject::Dict(states) => {
            let chosen = doc
                .dict_get(annot, "AS")
                .and_then(|s| s.as_name().ok())
                .and_then(|s| doc.dict_get(states, s));
            match chosen {
                Some(PDFObject::Stream(stream)) => Appearance::Stream(stream),
                _ => Appearance::Unusable,
            }
        }
        _ => Appearance::Unusable,
    }
}

/// Decode and replay an appearance stream.
fn replay_appearance<'a>(
    cx: &PageContext<'a>,
    stream: &'a PDFStream,
) -> Option<(Vec<ContentOperator>, Vec<Step>, Option<&'a PDFDict>)> {
    let doc = cx.doc;
    let ops = doc.decode_stream(stream, cx.limit).and_then(|data| parse_content(&data)).ok()?;
    let resources = stream.get("Resources").and_then(|r| doc.resolve_dict(r));
    let steps = PageInterpreter::new(doc, resources, cx.limit).replay(&ops, MATRIX_IDENTITY).ok()?;
    Some((ops, steps, resources))
}

/// `true` unless the appearance provably shows no text.
fn shows_text(cx: &PageContext<'_>, stream: &PDFStream) -> bool {
    let Some((ops, steps, _)) = replay_appearance(cx, stream) else {
        return true;
    };
    ops.iter()
        .zip(&steps)
        .any(|(op, step)| !step.glyphs.is_empty() || op.op.is_text_show())
}

/// `true` when the appearance paints exactly one opaque flat rectangle
/// fill or one unmasked image, and shows no text.
fn paints_one_solid_shape(cx: &PageContext<'_>, stream: &PDFStream) -> bool {
    let doc = cx.doc;
    let Some((ops, steps, resources)) = replay_appearance(cx, stream) else {
        return false;
    };

    let mut shapes = 0usize;
    let mut rect_only = true;
    let mut has_path = false;
    for (op, step) in ops.iter().zip(&steps) {
        if !step.glyphs.is_empty() || op.op.is_text_show() {
            return false;
        }
        match &op.op {
            Keyword::Re => has_path = true,
            Keyword::Mm | Keyword::L | Keyword::C | Keyword::V | Keyword::Y => {
                has_path = true;
                rect_only = false;
            }
            kw if kw.is_fill() => {
                let state = &step.state;
                if !(has_path && rect_only && state.fill_color.is_flat() && state.fill_alpha >= MIN_OPACITY) {
                    return false;
                }
                shapes += 1;
                has_path = false;
                rect_only = true;
            }
            kw if kw.is_path_paint() => {
                has_path = false;
                rect_only = true;
            }
            Keyword::Do => {
                let image = op
                    .operands
                    .last()
                    .and_then(|n| n.as_name().ok())
                    .and_then(|name| {
                        let xobjects = doc.dict_get(resources?, "XObject")?.as_dict().ok()?;
                        doc.resolve(xobjects.get(name)?).as_stream().ok()
                    })
                    .filter(|x| x.get("Subtype").is_some_and(|s| s.is_name("Image")));
                match image {
                    Some(x) if !x.contains("SMask") && !x.contains("Mask") => shapes += 1,
                    _ => return false,
                }
            }
            Keyword::BI => shapes += 1,
            Keyword::Sh => return false,
            _ => {}
        }
    }
    shapes == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PDFPage;
    use crate::model::PDFObjRef;

    fn dict(entries: Vec<(&str, PDFObject)>) -> PDFDict {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn nums(vals: &[f64]) -> PDFObject {
        PDFObject::Array(vals.iter().map(|v| PDFObject::Real(*v)).collect())
    }

    fn appearance(doc: &mut PDFDocument, id: u32, content: &[u8]) -> PDFObject {
        let attrs = dict(vec![
            ("Subtype", PDFObject::Name("Form".into())),
            ("BBox", nums(&[0.0, 0.0, 60.0, 25.0])),
        ]);
        doc.insert(
            PDFObjRef::new(id, 0),
            PDFObject::Stream(Box::new(PDFStream::new(attrs, content.to_vec()))),
        );
        PDFObject::Dict(dict(vec![("N", PDFObject::Ref(PDFObjRef::new(id, 0)))]))
    }

    fn square(extra: Vec<(&str, PDFObject)>) -> PDFObject {
        let mut d = dict(vec![
            ("Type", PDFObject::Name("Annot".into())),
            ("Subtype", PDFObject::Name("Square".into())),
            ("Rect", nums(&[95.0, 690.0, 155.0, 715.0])),
        ]);
        d.extend(extra.into_iter().map(|(k, v)| (k.to_string(), v)));
        PDFObject::Dict(d)
    }

    fn run(doc: &PDFDocument, annots: &[u32]) -> Vec<AnnotRef> {
        let page = PDFPage {
            pageid: 3,
            attrs: PDFDict::new(),
            mediabox: Some((0.0, 0.0, 612.0, 792.0)),
            cropbox: None,
            rotate: 0,
            contents: Vec::new(),
            annots: annots
                .iter()
                .map(|id| AnnotRef::Indirect(PDFObjRef::new(*id, 0)))
                .collect(),
        };
        let steps = vec![Step {
            state: Default::default(),
            glyphs: vec![(100.0, 697.6, 136.0, 708.4)],
        }];
        let fields = FxHashSet::default();
        let cx = PageContext {
            doc,
            page: &page,
            ops: &[],
            steps: &steps,
            form_fields: &fields,
            margin: 1.5,
            limit: 1 << 20,
        };
        annotation_overlays(&cx)
    }

    fn annot_ids(marks: &[AnnotRef]) -> Vec<u32> {
        marks
            .iter()
            .filter_map(|m| match m {
                AnnotRef::Indirect(r) => Some(r.objid),
                AnnotRef::Inline(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_square_with_solid_appearance() {
        let mut doc = PDFDocument::new("1.7");
        let ap = appearance(&mut doc, 11, b"0 g 0 0 60 25 re f");
        doc.insert(PDFObjRef::new(10, 0), square(vec![("AP", ap)]));
        assert_eq!(annot_ids(&run(&doc, &[10])), [10]);
    }

    #[test]
    fn test_appearance_with_text_is_kept() {
        let mut doc = PDFDocument::new("1.7");
        let ap = appearance(&mut doc, 11, b"0 g 0 0 60 25 re f BT /F1 9 Tf (Note) Tj ET");
        doc.insert(PDFObjRef::new(10, 0), square(vec![("AP", ap)]));
        assert!(run(&doc, &[10]).is_empty());
    }

    #[test]
    fn test_two_fills_are_not_an_overlay() {
        let mut doc = PDFDocument::new("1.7");
        let ap = appearance(&mut doc, 11, b"0 g 0 0 30 25 re f 30 0 30 25 re f");
        doc.insert(PDFObjRef::new(10, 0), square(vec![("AP", ap)]));
        assert!(run(&doc, &[10]).is_empty());
    }

    #[test]
    fn test_hidden_or_translucent_is_kept() {
        let mut doc = PDFDocument::new("1.7");
        let ap = appearance(&mut doc, 11, b"0 g 0 0 60 25 re f");
        doc.insert(PDFObjRef::new(10, 0), square(vec![("AP", ap.clone()), ("F", PDFObject::Int(2))]));
        doc.insert(PDFObjRef::new(12, 0), square(vec![("AP", ap), ("CA", PDFObject::Real(0.3))]));
        assert!(run(&doc, &[10, 12]).is_empty());
    }

    #[test]
    fn test_interior_color_without_appearance() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(PDFObjRef::new(10, 0), square(vec![("IC", nums(&[0.0, 0.0, 0.0]))]));
        doc.insert(PDFObjRef::new(12, 0), square(vec![("IC", PDFObject::Array(Vec::new()))]));
        assert_eq!(annot_ids(&run(&doc, &[10, 12])), [10]);
    }

    fn marker(kind: &str, extra: Vec<(&str, PDFObject)>) -> PDFObject {
        let mut d = dict(vec![
            ("Subtype", PDFObject::Name(kind.into())),
            ("Rect", nums(&[95.0, 690.0, 155.0, 715.0])),
        ]);
        d.extend(extra.into_iter().map(|(k, v)| (k.to_string(), v)));
        PDFObject::Dict(d)
    }

    #[test]
    fn test_black_markup_without_appearance() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(PDFObjRef::new(10, 0), marker("Polygon", vec![("IC", nums(&[0.0, 0.0, 0.0]))]));
        doc.insert(PDFObjRef::new(11, 0), marker("Ink", vec![("C", nums(&[0.01]))]));
        doc.insert(PDFObjRef::new(12, 0), marker("Highlight", vec![("C", nums(&[0.0, 0.0, 0.0, 1.0]))]));
        doc.insert(PDFObjRef::new(13, 0), marker("Stamp", vec![("C", nums(&[0.0, 0.0, 0.0]))]));
        // Yellow highlight, and an ink mark with no colour at all
        doc.insert(PDFObjRef::new(14, 0), marker("Highlight", vec![("C", nums(&[1.0, 1.0, 0.0]))]));
        doc.insert(PDFObjRef::new(15, 0), marker("Ink", Vec::new()));
        assert_eq!(annot_ids(&run(&doc, &[10, 11, 12, 13, 14, 15])), [10, 11, 12, 13]);
    }

    #[test]
    fn test_black_markup_gates() {
        let mut doc = PDFDocument::new("1.7");
        let black = || ("C", nums(&[0.0]));
        doc.insert(PDFObjRef::new(10, 0), marker("Ink", vec![black(), ("CA", PDFObject::Real(0.5))]));
        doc.insert(PDFObjRef::new(11, 0), marker("Ink", vec![black(), ("F", PDFObject::Int(32))]));
        let d = dict(vec![
            ("Subtype", PDFObject::Name("Polygon".into())),
            ("Rect", nums(&[120.0, 600.0, 155.0, 715.0])),
            black(),
        ]);
        doc.insert(PDFObjRef::new(12, 0), PDFObject::Dict(d));
        assert!(run(&doc, &[10, 11, 12]).is_empty());
    }

    #[test]
    fn test_black_markup_appearance_with_text_is_kept() {
        let mut doc = PDFDocument::new("1.7");
        let shape = appearance(&mut doc, 20, b"0 g 0 0 m 60 0 l 30 25 l h f");
        let text = appearance(&mut doc, 21, b"0 g 0 0 m 60 0 l 30 25 l h f BT /F1 9 Tf (Note) Tj ET");
        doc.insert(PDFObjRef::new(10, 0), marker("Polygon", vec![("IC", nums(&[0.0])), ("AP", shape)]));
        doc.insert(PDFObjRef::new(11, 0), marker("Polygon", vec![("IC", nums(&[0.0])), ("AP", text)]));
        assert_eq!(annot_ids(&run(&doc, &[10, 11])), [10]);
    }

    #[test]
    fn test_form_widget_is_kept() {
        let mut doc = PDFDocument::new("1.7");
        let ap = appearance(&mut doc, 11, b"0 g 0 0 60 25 re f");
        let widget = dict(vec![
            ("Subtype", PDFObject::Name("Widget".into())),
            ("Rect", nums(&[95.0, 690.0, 155.0, 715.0])),
            ("FT", PDFObject::Name("Tx".into())),
            ("AP", ap),
        ]);
        doc.insert(PDFObjRef::new(10, 0), PDFObject::Dict(widget));
        assert!(run(&doc, &[10]).is_empty());
    }

    #[test]
    fn test_popup_follows_parent() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(
            PDFObjRef::new(10, 0),
            square(vec![
                ("IC", nums(&[0.0])),
                ("Popup", PDFObject::Ref(PDFObjRef::new(13, 0))),
            ]),
        );
        let popup = dict(vec![
            ("Subtype", PDFObject::Name("Popup".into())),
            ("Rect", nums(&[300.0, 300.0, 400.0, 400.0])),
            ("Parent", PDFObject::Ref(PDFObjRef::new(10, 0))),
        ]);
        doc.insert(PDFObjRef::new(13, 0), PDFObject::Dict(popup));
        assert_eq!(annot_ids(&run(&doc, &[10, 13])), [10, 13]);
    }

    #[test]
    fn test_partial_overlap_is_kept() {
        let mut doc = PDFDocument::new("1.7");
        let d = dict(vec![
            ("Subtype", PDFObject::Name("Square".into())),
            ("Rect", nums(&[120.0, 600.0, 155.0, 715.0])),
            ("IC", nums(&[0.0])),
        ]);
        doc.insert(PDFObjRef::new(10, 0), PDFObject::Dict(d));
        assert!(run(&doc, &[10]).is_empty());
    }
}
