//! Content stream replay.
//!
//! [`PageInterpreter::replay`] folds a page's operators into the graphics
//! state each one executes under, together with the page-space boxes of
//! any glyphs it shows. Operator handlers live in `ops/`, grouped by
//! category.

use super::content::ContentOperator;
use super::state::GraphicsState;
use crate::document::PDFDocument;
use crate::error::Result;
use crate::font::FontMetrics;
use crate::geometry::{Matrix, Point, Rect};
use crate::limits::{Budget, CancellationToken, ensure_within};
use crate::model::{PDFDict, PDFObject};
use crate::parser::Keyword;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Deepest form XObject nesting followed for glyph boxes.
pub const MAX_FORM_DEPTH: usize = 8;

/// Operators one replay may dispatch, form content included.
pub const DEFAULT_MAX_OPERATORS: usize = 1_000_000;

/// Operators between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// One replayed operator.
#[derive(Debug, Clone)]
pub struct Step {
    /// State in effect when the operator runs
    pub state: GraphicsState,
    /// Page-space boxes of glyphs shown by the operator, including those
    /// shown inside a form it invokes
    pub glyphs: Vec<Rect>,
}

/// Replays content streams against one resource dictionary.
pub struct PageInterpreter<'a> {
    pub(crate) doc: &'a PDFDocument,
    pub(crate) resources: Option<&'a PDFDict>,
    pub(crate) state: GraphicsState,
    pub(crate) gstack: Vec<GraphicsState>,
    /// Page-space bounds of the path under construction
    pub(crate) path_bbox: Option<Rect>,
    /// Current point in user space
    pub(crate) current_point: Option<Point>,
    /// `W`/`W*` seen; the next painting operator clips
    pub(crate) pending_clip: bool,
    pub(crate) fonts: FxHashMap<u32, Arc<FontMetrics>>,
    pub(crate) form_stack: Vec<Option<u32>>,
    /// Parsed content of forms already run, by object number
    pub(crate) form_ops: FxHashMap<u32, Arc<[ContentOperator]>>,
    /// Decoded size limit for form XObject streams
    pub(crate) limit: usize,
    pub(crate) max_ops: usize,
    /// Operators dispatched by the current replay
    pub(crate) ops_run: usize,
    pub(crate) budget: Budget,
    /// Glyph boxes produced by the operator being replayed
    pub(crate) glyphs: Vec<Rect>,
}

impl<'a> PageInterpreter<'a> {
    pub fn new(doc: &'a PDFDocument, resources: Option<&'a PDFDict>, limit: usize) -> Self {
        Self {
            doc,
            resources,
            state: GraphicsState::default(),
            gstack: Vec::new(),
            path_bbox: None,
            current_point: None,
            pending_clip: false,
            fonts: FxHashMap::default(),
            form_stack: Vec::new(),
            form_ops: FxHashMap::default(),
            limit,
            max_ops: DEFAULT_MAX_OPERATORS,
            ops_run: 0,
            budget: Budget::new(None, CANCEL_CHECK_INTERVAL),
            glyphs: Vec::new(),
        }
    }

    /// Cap the operators a replay may dispatch and poll `token` while it
    /// runs. Either limit fails the replay with `ResourceLimitExceeded`.
    pub fn with_limits(mut self, max_ops: usize, token: Option<CancellationToken>) -> Self {
        self.max_ops = max_ops;
        self.budget = Budget::new(token, CANCEL_CHECK_INTERVAL);
        self
    }

    /// Replay `ops` starting from a fresh state with the given CTM.
    ///
    /// Returns one [`Step`] per operator, in order.
    pub fn replay(&mut self, ops: &[ContentOperator], ctm: Matrix) -> Result<Vec<Step>> {
        ensure_within("content operators", ops.len(), self.max_ops)?;
        self.state = GraphicsState::new(ctm);
        self.gstack.clear();
        self.path_bbox = None;
        self.current_point = None;
        self.pending_clip = false;
        self.ops_run = 0;

        let mut steps = Vec::with_capacity(ops.len());
        for op in ops {
            self.count_op()?;
            let state = self.state.clone();
            self.glyphs.clear();
            self.dispatch(op)?;
            steps.push(Step {
                state,
                glyphs: std::mem::take(&mut self.glyphs),
            });
        }
        Ok(steps)
    }

    /// Count one dispatched operator against the replay's limits.
    pub(crate) fn count_op(&mut self) -> Result<()> {
        self.ops_run += 1;
        ensure_within("content operators", self.ops_run, self.max_ops)?;
        self.budget.tick()
    }

    /// Look up `name` in a resource category, resolved.
    ///
    /// Also returns the object number when the entry is a reference.
    pub(crate) fn lookup(&self, category: &str, name: &str) -> Option<(Option<u32>, &'a PDFObject)> {
        let doc = self.doc;
        let entries = doc.dict_get(self.resources?, category)?.as_dict().ok()?;
        let entry = entries.get(name)?;
        let objid = match entry {
            PDFObject::Ref(r) => Some(r.objid),
            _ => None,
        };
        let obj = doc.resolve(entry);
        (!obj.is_null()).then_some((objid, obj))
    }

    pub(crate) fn dispatch(&mut self, op: &ContentOperator) -> Result<()> {
        let args = op.operands.as_slice();
        match &op.op {
            // Graphics state
            Keyword::Qq => self.do_q(),
            Keyword::Q => self.do_Q()?,
            Keyword::Cm => {
                if let Some([a, b, c, d, e, f]) = nums(args) {
                    self.do_cm((a, b, c, d, e, f));
                }
            }
            Keyword::Gs => {
                if let Some(name) = last_name(args) {
                    self.do_gs(name);
                }
            }

            // Non-stroking colour
            Keyword::Gg => {
                if let Some([g]) = nums(args) {
                    self.do_g(g);
                }
            }
            Keyword::Rg => {
                if let Some([r, g, b]) = nums(args) {
                    self.do_rg(r, g, b);
                }
            }
            Keyword::Kk => {
                if let Some([c, m, y, k]) = nums(args) {
                    self.do_k(c, m, y, k);
                }
            }
            Keyword::Cs => {
                if let Some(name) = last_name(args) {
                    self.do_cs(name);
                }
            }
            Keyword::Sc | Keyword::Scn => self.do_scn(args),

            // Path construction
            Keyword::Mm => {
                if let Some([x, y]) = nums(args) {
                    self.do_m(x, y);
                }
            }
            Keyword::L => {
                if let Some([x, y]) = nums(args) {
                    self.do_l(x, y);
                }
            }
            Keyword::C => {
                if let Some([x1, y1, x2, y2, x3, y3]) = nums(args) {
                    self.do_c(x1, y1, x2, y2, x3, y3);
                }
            }
            Keyword::V => {
                if let Some([x2, y2, x3, y3]) = nums(args) {
                    self.do_v(x2, y2, x3, y3);
                }
            }
            Keyword::Y => {
                if let Some([x1, y1, x3, y3]) = nums(args) {
                    self.do_y(x1, y1, x3, y3);
                }
            }
            Keyword::H => self.do_h(),
            Keyword::Re => {
                if let Some([x, y, w, h]) = nums(args) {
                    self.do_re(x, y, w, h);
                }
            }
            Keyword::WClip | Keyword::WStar => self.pending_clip = true,
            kw if kw.is_path_paint() => self.paint_path(),

            // Text
            Keyword::BT => self.do_BT(),
            Keyword::Tc => {
                if let Some([v]) = nums(args) {
                    self.state.text.charspace = v;
                }
            }
            Keyword::Tw => {
                if let Some([v]) = nums(args) {
                    self.state.text.wordspace = v;
                }
            }
            Keyword::Tz => {
                if let Some([v]) = nums(args) {
                    self.state.text.scaling = v;
                }
            }
            Keyword::TL => {
                if let Some([v]) = nums(args) {
                    self.state.text.leading = v;
                }
            }
            Keyword::Tr => {
                if let Some(mode) = args.last().and_then(|m| m.as_int().ok()) {
                    self.state.text.render = mode;
                }
            }
            Keyword::Ts => {
                if let Some([v]) = nums(args) {
                    self.state.text.rise = v;
                }
            }
            Keyword::Tf => {
                if let [.., PDFObject::Name(name), size] = args
                    && let Ok(size) = size.as_num()
                {
                    self.do_Tf(name, size);
                }
            }
            Keyword::Td => {
                if let Some([tx, ty]) = nums(args) {
                    self.do_Td(tx, ty);
                }
            }
            Keyword::TD => {
                if let Some([tx, ty]) = nums(args) {
                    self.do_TD(tx, ty);
                }
            }
            Keyword::Tm => {
                if let Some([a, b, c, d, e, f]) = nums(args) {
                    self.do_Tm((a, b, c, d, e, f));
                }
            }
            Keyword::TStar => self.do_T_star(),
            Keyword::Tj => {
                if let Some(PDFObject::String(s)) = args.last() {
                    self.show_string(s);
                }
            }
            Keyword::TJ => {
                if let Some(PDFObject::Array(seq)) = args.last() {
                    self.do_TJ(seq);
                }
            }
            Keyword::Quote => {
                if let Some(PDFObject::String(s)) = args.last() {
                    self.do_quote(s);
                }
            }
            Keyword::DoubleQuote => {
                if let [.., aw, ac, PDFObject::String(s)] = args
                    && let (Ok(aw), Ok(ac)) = (aw.as_num(), ac.as_num())
                {
                    self.do_doublequote(aw, ac, s);
                }
            }

            // XObjects
            Keyword::Do => {
                if let Some(name) = last_name(args) {
                    self.do_Do(name)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// The last `N` operands as numbers.
pub(crate) fn nums<const N: usize>(args: &[PDFObject]) -> Option<[f64; N]> {
    let tail = args.get(args.len().checked_sub(N)?..)?;
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(tail) {
        *slot = obj.as_num().ok()?;
    }
    Some(out)
}

fn last_name(args: &[PDFObject]) -> Option<&str> {
    args.last().and_then(|n| n.as_name().ok())
}
