//! XObject operators.
//!
//! Handles: Do
//!
//! Images draw nothing the replay needs to track. Forms are replayed in
//! place so that text they show is attributed to the invoking `Do`.

use crate::document::PDFDocument;
use crate::error::Result;
use crate::geometry::{MATRIX_IDENTITY, Matrix, Point, Rect, mult_matrix};
use crate::interp::content::{ContentOperator, parse_content};
use crate::interp::interpreter::{MAX_FORM_DEPTH, PageInterpreter};
use crate::interp::state::GraphicsState;
use crate::model::{PDFDict, PDFObject, PDFStream};
use std::sync::Arc;
use tracing::{debug, warn};

/// Interpreter fields replaced while a form runs.
struct SavedFrame<'a> {
    state: GraphicsState,
    gstack: Vec<GraphicsState>,
    resources: Option<&'a PDFDict>,
    path_bbox: Option<Rect>,
    current_point: Option<Point>,
    pending_clip: bool,
}

#[allow(non_snake_case)]
impl<'a> PageInterpreter<'a> {
    /// Do - Invoke a named XObject.
    ///
    /// PDF operator: `Do`
    pub fn do_Do(&mut self, name: &str) -> Result<()> {
        let Some((objid, PDFObject::Stream(xobj))) = self.lookup("XObject", name) else {
            return Ok(());
        };
        if xobj.get("Subtype").is_some_and(|s| s.is_name("Form")) {
            self.run_form(objid, xobj)?;
        }
        Ok(())
    }

    /// Replay a form XObject's content under the current state.
    ///
    /// Recursion stops at [`MAX_FORM_DEPTH`] and on cycles. A form whose
    /// content cannot be read is skipped; only resource limits propagate.
    /// Parsed content is kept per object number, so a form invoked again
    /// costs only its operators.
    fn run_form(&mut self, objid: Option<u32>, form: &'a PDFStream) -> Result<()> {
        if self.form_stack.len() >= MAX_FORM_DEPTH {
            debug!(depth = self.form_stack.len(), "form XObject nesting too deep, skipping");
            return Ok(());
        }
        if objid.is_some() && self.form_stack.contains(&objid) {
            debug!(form = ?objid, "form XObject invokes itself, skipping");
            return Ok(());
        }
        self.budget.check()?;

        let doc = self.doc;
        let cached = objid.and_then(|id| self.form_ops.get(&id).cloned());
        let ops = match cached {
            Some(ops) => ops,
            None => {
                let ops: Arc<[ContentOperator]> = match doc
                    .decode_stream(form, self.limit)
                    .and_then(|data| parse_content(&data))
                {
                    Ok(ops) => ops.into(),
                    Err(e) if e.kind().is_resource_limit() => return Err(e),
                    Err(e) => {
                        warn!(form = ?objid, error = %e, "skipping unreadable form XObject");
                        Vec::new().into()
                    }
                };
                if let Some(id) = objid {
                    self.form_ops.insert(id, Arc::clone(&ops));
                }
                ops
            }
        };
        if ops.is_empty() {
            return Ok(());
        }

        let matrix = parse_matrix(doc, form.get("Matrix"));
        let resources = form
            .get("Resources")
            .and_then(|r| doc.resolve_dict(r))
            .or(self.resources);

        let saved = SavedFrame {
            state: self.state.clone(),
            gstack: std::mem::take(&mut self.gstack),
            resources: std::mem::replace(&mut self.resources, resources),
            path_bbox: self.path_bbox.take(),
            current_point: self.current_point.take(),
            pending_clip: std::mem::take(&mut self.pending_clip),
        };
        self.state.ctm = mult_matrix(matrix, self.state.ctm);
        self.form_stack.push(objid);

        let result = ops.iter().try_for_each(|op| {
            self.count_op()?;
            self.dispatch(op)
        });

        self.form_stack.pop();
        self.state = saved.state;
        self.gstack = saved.gstack;
        self.resources = saved.resources;
        self.path_bbox = saved.path_bbox;
        self.current_point = saved.current_point;
        self.pending_clip = saved.pending_clip;

        match result {
            Err(e) if e.kind().is_resource_limit() => Err(e),
            Err(e) => {
                warn!(form = ?objid, error = %e, "form XObject content is malformed, glyphs may be incomplete");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

/// Parse a `/Matrix` entry, defaulting to identity.
fn parse_matrix(doc: &PDFDocument, obj: Option<&PDFObject>) -> Matrix {
    let Some(PDFObject::Array(arr)) = obj.map(|o| doc.resolve(o)) else {
        return MATRIX_IDENTITY;
    };
    let vals: Vec<f64> = arr.iter().filter_map(|v| doc.resolve_num(v)).collect();
    match vals.as_slice() {
        &[a, b, c, d, e, f] => (a, b, c, d, e, f),
        _ => MATRIX_IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use crate::document::PDFDocument;
    use crate::geometry::MATRIX_IDENTITY;
    use crate::interp::content::parse_content;
    use crate::interp::interpreter::PageInterpreter;
    use crate::model::{PDFDict, PDFObjRef, PDFObject, PDFStream};

    fn form(content: &[u8], matrix: Option<[i64; 6]>) -> PDFObject {
        let mut attrs = PDFDict::new();
        attrs.insert("Subtype".into(), PDFObject::Name("Form".into()));
        if let Some(m) = matrix {
            attrs.insert("Matrix".into(), PDFObject::Array(m.iter().map(|v| PDFObject::Int(*v)).collect()));
        }
        PDFObject::Stream(Box::new(PDFStream::new(attrs, content.to_vec())))
    }

    fn resources(entries: &[(&str, u32)]) -> PDFDict {
        let xobjects: PDFDict = entries
            .iter()
            .map(|(n, id)| ((*n).to_string(), PDFObject::Ref(PDFObjRef::new(*id, 0))))
            .collect();
        let mut res = PDFDict::new();
        res.insert("XObject".into(), PDFObject::Dict(xobjects));
        res
    }

    #[test]
    fn test_form_glyphs_attributed_to_do() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(
            PDFObjRef::new(5, 0),
            form(b"BT /F1 10 Tf (A) Tj ET", Some([1, 0, 0, 1, 50, 60])),
        );
        let res = resources(&[("Fm1", 5)]);
        let ops = parse_content(b"q /Fm1 Do Q").unwrap();
        let steps = PageInterpreter::new(&doc, Some(&res), 1 << 20)
            .replay(&ops, MATRIX_IDENTITY)
            .unwrap();
        assert_eq!(steps[1].glyphs.len(), 1);
        assert!((steps[1].glyphs[0].0 - 50.0).abs() < 1e-9);
        // State after the form is the caller's again
        assert_eq!(steps[2].state.ctm, MATRIX_IDENTITY);
    }

    #[test]
    fn test_self_invoking_form_terminates() {
        let mut doc = PDFDocument::new("1.7");
        let mut stream = form(b"/Fm1 Do BT (A) Tj ET", None);
        if let PDFObject::Stream(s) = &mut stream {
            s.attrs.insert("Resources".into(), PDFObject::Dict(resources(&[("Fm1", 5)])));
        }
        doc.insert(PDFObjRef::new(5, 0), stream);
        let res = resources(&[("Fm1", 5)]);
        let ops = parse_content(b"/Fm1 Do").unwrap();
        let steps = PageInterpreter::new(&doc, Some(&res), 1 << 20)
            .replay(&ops, MATRIX_IDENTITY)
            .unwrap();
        assert_eq!(steps[0].glyphs.len(), 1);
    }

    #[test]
    fn test_form_fan_out_hits_operator_limit() {
        // Each level invokes the next twelve times
        let mut doc = PDFDocument::new("1.7");
        for id in 5..12 {
            let mut stream = form("/X Do ".repeat(12).as_bytes(), None);
            if let PDFObject::Stream(s) = &mut stream {
                s.attrs.insert("Resources".into(), PDFObject::Dict(resources(&[("X", id + 1)])));
            }
            doc.insert(PDFObjRef::new(id, 0), stream);
        }
        doc.insert(PDFObjRef::new(12, 0), form(b"BT (A) Tj ET", None));
        let res = resources(&[("X", 5)]);
        let ops = parse_content(b"/X Do").unwrap();

        let mut interp = PageInterpreter::new(&doc, Some(&res), 1 << 20).with_limits(10_000, None);
        let err = interp.replay(&ops, MATRIX_IDENTITY).unwrap_err();
        assert!(err.kind().is_resource_limit());
        assert_eq!(interp.ops_run, 10_001);
        // Every level was parsed once
        assert_eq!(interp.form_ops.len(), 8);
    }

    #[test]
    fn test_repeated_form_is_parsed_once() {
        let mut doc = PDFDocument::new("1.7");
        doc.insert(PDFObjRef::new(5, 0), form(b"BT (A) Tj ET", None));
        let res = resources(&[("Fm1", 5)]);
        let ops = parse_content(b"/Fm1 Do /Fm1 Do").unwrap();
        let mut interp = PageInterpreter::new(&doc, Some(&res), 1 << 20);
        let steps = interp.replay(&ops, MATRIX_IDENTITY).unwrap();
        assert_eq!(steps[0].glyphs, steps[1].glyphs);
        assert_eq!(interp.form_ops.len(), 1);
    }
}
