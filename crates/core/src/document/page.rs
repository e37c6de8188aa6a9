//! Page tree walker.
//!
//! Expands the catalog's `/Pages` tree into leaf pages in `/Kids` order,
//! applying inherited attributes on the way down.

use super::catalog::PDFDocument;
use crate::error::{PdfError, Result};
use crate::geometry::{Rect, normalize_rect};
use crate::limits::ensure_within;
use crate::model::{PDFDict, PDFObjRef, PDFObject};
use rustc_hash::FxHashSet;
use tracing::warn;

/// Deepest page tree accepted.
const MAX_TREE_DEPTH: usize = 256;

/// Entry of a page's `/Annots` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotRef {
    /// Indirect annotation dictionary
    Indirect(PDFObjRef),
    /// Direct dictionary at this index of `/Annots`
    Inline(usize),
}

/// A leaf page with inherited attributes applied.
#[derive(Debug, Clone)]
pub struct PDFPage {
    /// Page object ID
    pub pageid: u32,
    /// Page attributes dictionary, inherited entries included
    pub attrs: PDFDict,
    /// Media box (physical page size)
    pub mediabox: Option<Rect>,
    /// Crop box
    pub cropbox: Option<Rect>,
    /// Page rotation in degrees
    pub rotate: i64,
    /// Content streams in drawing order
    pub contents: Vec<PDFObjRef>,
    /// Annotation entries in `/Annots` order
    pub annots: Vec<AnnotRef>,
}

impl PDFPage {
    /// The page's resource dictionary.
    pub fn resources<'a>(&'a self, doc: &'a PDFDocument) -> Option<&'a PDFDict> {
        self.attrs.get("Resources").and_then(|r| doc.resolve_dict(r))
    }

    /// Visible area: the crop box clipped to the media box.
    pub fn visible_box(&self) -> Option<Rect> {
        match (self.cropbox, self.mediabox) {
            (Some(c), Some(m)) => crate::geometry::intersect_rect(c, m).or(Some(m)),
            (c, m) => c.or(m),
        }
    }

    /// Resolve an annotation entry to its dictionary.
    pub fn annot_dict<'a>(&'a self, doc: &'a PDFDocument, annot: AnnotRef) -> Option<&'a PDFDict> {
        match annot {
            AnnotRef::Indirect(r) => doc.get(r.objid).and_then(|o| o.as_dict().ok()),
            AnnotRef::Inline(index) => {
                let annots = doc.resolve(self.attrs.get("Annots")?).as_array().ok()?;
                annots.get(index).and_then(|o| o.as_dict().ok())
            }
        }
    }

    /// Concatenate the decoded content streams, separated by a newline so
    /// that tokens never fuse across stream boundaries.
    pub fn content_bytes(&self, doc: &PDFDocument, limit: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (i, r) in self.contents.iter().enumerate() {
            let Some(PDFObject::Stream(stream)) = doc.get(r.objid) else {
                continue;
            };
            if i > 0 {
                out.push(b'\n');
            }
            out.extend(doc.decode_stream(stream, limit)?);
            ensure_within("content stream bytes", out.len(), limit)?;
        }
        Ok(out)
    }
}

/// Attributes a page inherits from its ancestors.
#[derive(Debug, Clone, Copy, Default)]
struct InheritedNode<'a> {
    resources: Option<&'a PDFObject>,
    mediabox: Option<&'a PDFObject>,
    cropbox: Option<&'a PDFObject>,
    rotate: Option<&'a PDFObject>,
}

impl<'a> InheritedNode<'a> {
    /// Values on `dict` override those inherited from the parent.
    fn extend(self, dict: &'a PDFDict) -> Self {
        Self {
            resources: dict.get("Resources").or(self.resources),
            mediabox: dict.get("MediaBox").or(self.mediabox),
            cropbox: dict.get("CropBox").or(self.cropbox),
            rotate: dict.get("Rotate").or(self.rotate),
        }
    }

    fn apply_to(&self, dest: &mut PDFDict) {
        for (key, value) in [
            ("Resources", self.resources),
            ("MediaBox", self.mediabox),
            ("CropBox", self.cropbox),
            ("Rotate", self.rotate),
        ] {
            if let Some(value) = value
                && !dest.contains_key(key)
            {
                dest.insert(key.to_string(), value.clone());
            }
        }
    }
}

/// Collect every page of `doc` in document order.
pub fn collect_pages(doc: &PDFDocument) -> Result<Vec<PDFPage>> {
    let catalog = doc.catalog()?;
    let root = match catalog.get("Pages") {
        Some(PDFObject::Ref(r)) => *r,
        Some(other) => {
            return Err(PdfError::MalformedPageTree(format!(
                "catalog /Pages is a {}, not a reference",
                other.type_name()
            )));
        }
        None => return Err(PdfError::MalformedPageTree("catalog has no /Pages".into())),
    };

    let mut walker = Walker {
        doc,
        path: Vec::new(),
        emitted: FxHashSet::default(),
        pages: Vec::new(),
    };
    walker.visit(root.objid, InheritedNode::default(), true)?;
    Ok(walker.pages)
}

struct Walker<'a> {
    doc: &'a PDFDocument,
    /// Node ids from the root to the current node
    path: Vec<u32>,
    emitted: FxHashSet<u32>,
    pages: Vec<PDFPage>,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, objid: u32, inherited: InheritedNode<'a>, is_root: bool) -> Result<()> {
        if self.path.contains(&objid) {
            return Err(PdfError::MalformedPageTree(format!(
                "cycle through node {objid}"
            )));
        }
        if self.path.len() >= MAX_TREE_DEPTH {
            return Err(PdfError::MalformedPageTree("page tree too deep".into()));
        }

        let doc = self.doc;
        let dict = match doc.get(objid) {
            Some(PDFObject::Dict(d)) => d,
            Some(other) => {
                return Err(PdfError::MalformedPageTree(format!(
                    "node {objid} is a {}, not a dictionary",
                    other.type_name()
                )));
            }
            None => {
                return Err(PdfError::MalformedPageTree(format!("node {objid} is missing")));
            }
        };

        match dict.get("Type").map(|t| doc.resolve(t)) {
            Some(PDFObject::Name(name)) if name == "Pages" => {
                let inherited = inherited.extend(dict);
                let kids = dict
                    .get("Kids")
                    .map(|k| doc.resolve(k))
                    .and_then(|k| k.as_array().ok())
                    .ok_or_else(|| {
                        PdfError::MalformedPageTree(format!("pages node {objid} has no /Kids array"))
                    })?;

                self.path.push(objid);
                for kid in kids {
                    let PDFObject::Ref(kid) = kid else {
                        return Err(PdfError::MalformedPageTree(format!(
                            "kid of node {objid} is a {}, not a reference",
                            kid.type_name()
                        )));
                    };
                    self.visit(kid.objid, inherited, false)?;
                }
                self.path.pop();
                Ok(())
            }
            Some(PDFObject::Name(name)) if name == "Page" && !is_root => {
                if !self.emitted.insert(objid) {
                    warn!(page = objid, "page listed twice in the page tree, keeping the first");
                    return Ok(());
                }
                self.pages.push(build_page(doc, objid, dict, inherited.extend(dict)));
                Ok(())
            }
            Some(PDFObject::Name(name)) => Err(PdfError::MalformedPageTree(format!(
                "node {objid} has unexpected /Type /{name}"
            ))),
            _ => Err(PdfError::MalformedPageTree(format!(
                "node {objid} has no /Type"
            ))),
        }
    }
}

fn build_page(doc: &PDFDocument, pageid: u32, dict: &PDFDict, inherited: InheritedNode<'_>) -> PDFPage {
    let mut attrs = dict.clone();
    inherited.apply_to(&mut attrs);

    let rotate = attrs
        .get("Rotate")
        .and_then(|r| doc.resolve(r).as_int().ok())
        .unwrap_or(0)
        .rem_euclid(360);

    PDFPage {
        pageid,
        mediabox: attrs.get("MediaBox").and_then(|b| parse_box(doc, b)),
        cropbox: attrs.get("CropBox").and_then(|b| parse_box(doc, b)),
        rotate,
        contents: content_refs(doc, pageid, attrs.get("Contents")),
        annots: annot_refs(doc, attrs.get("Annots")),
        attrs,
    }
}

fn parse_box(doc: &PDFDocument, obj: &PDFObject) -> Option<Rect> {
    let arr = doc.resolve(obj).as_array().ok()?;
    let nums: Vec<f64> = arr.iter().filter_map(|v| doc.resolve_num(v)).collect();
    let &[x0, y0, x1, y1] = nums.as_slice() else {
        return None;
    };
    Some(normalize_rect((x0, y0, x1, y1)))
}

fn content_refs(doc: &PDFDocument, pageid: u32, contents: Option<&PDFObject>) -> Vec<PDFObjRef> {
    let mut refs = Vec::new();
    let mut push = |obj: &PDFObject| match obj {
        PDFObject::Ref(r) if matches!(doc.get(r.objid), Some(PDFObject::Stream(_))) => refs.push(*r),
        other => warn!(page = pageid, kind = other.type_name(), "ignoring non-stream /Contents entry"),
    };

    match contents {
        None => {}
        Some(PDFObject::Ref(r)) => match doc.get(r.objid) {
            Some(PDFObject::Array(arr)) => arr.iter().for_each(&mut push),
            _ => push(&PDFObject::Ref(*r)),
        },
        Some(PDFObject::Array(arr)) => arr.iter().for_each(&mut push),
        Some(other) => push(other),
    }
    refs
}

fn annot_refs(doc: &PDFDocument, annots: Option<&PDFObject>) -> Vec<AnnotRef> {
    let Some(arr) = annots.and_then(|a| doc.resolve(a).as_array().ok()) else {
        return Vec::new();
    };
    arr.iter()
        .enumerate()
        .filter_map(|(i, entry)| match entry {
            PDFObject::Ref(r) if doc.resolve_dict(entry).is_some() => Some(AnnotRef::Indirect(*r)),
            PDFObject::Dict(_) => Some(AnnotRef::Inline(i)),
            _ => None,
        })
        .collect()
}
