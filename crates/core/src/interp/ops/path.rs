//! Path construction and painting operators.
//!
//! Handles: m, l, c, v, y, h, re, S, s, f, F, f*, B, B*, b, b*, n, W, W*
//!
//! Only the page-space bounds of the path are kept; they become the clip
//! box when a `W`/`W*` is pending at the painting operator.

use crate::geometry::{apply_matrix_pt, intersect_rect};
use crate::interp::interpreter::PageInterpreter;

impl PageInterpreter<'_> {
    fn extend_path(&mut self, x: f64, y: f64) {
        let (px, py) = apply_matrix_pt(self.state.ctm, (x, y));
        self.path_bbox = Some(match self.path_bbox {
            Some((x0, y0, x1, y1)) => (x0.min(px), y0.min(py), x1.max(px), y1.max(py)),
            None => (px, py, px, py),
        });
        self.current_point = Some((x, y));
    }

    /// PDF operator: `m`
    pub fn do_m(&mut self, x: f64, y: f64) {
        self.extend_path(x, y);
    }

    /// PDF operator: `l`
    pub fn do_l(&mut self, x: f64, y: f64) {
        self.extend_path(x, y);
    }

    /// Control points bound the curve, so they bound the path too.
    ///
    /// PDF operator: `c`
    pub fn do_c(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        self.extend_path(x1, y1);
        self.extend_path(x2, y2);
        self.extend_path(x3, y3);
    }

    /// PDF operator: `v`
    pub fn do_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) {
        self.extend_path(x2, y2);
        self.extend_path(x3, y3);
    }

    /// PDF operator: `y`
    pub fn do_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) {
        self.extend_path(x1, y1);
        self.extend_path(x3, y3);
    }

    /// PDF operator: `h`
    pub const fn do_h(&mut self) {}

    /// PDF operator: `re`
    pub fn do_re(&mut self, x: f64, y: f64, w: f64, h: f64) {
        for (px, py) in [(x + w, y), (x + w, y + h), (x, y + h), (x, y)] {
            self.extend_path(px, py);
        }
    }

    /// Ends the path, applying a pending clip.
    ///
    /// PDF operators: `S s f F f* B B* b b* n`
    pub fn paint_path(&mut self) {
        if std::mem::take(&mut self.pending_clip)
            && let Some(bbox) = self.path_bbox
        {
            self.state.clip = Some(match self.state.clip {
                Some(clip) => intersect_rect(clip, bbox).unwrap_or((0.0, 0.0, 0.0, 0.0)),
                None => bbox,
            });
        }
        self.path_bbox = None;
        self.current_point = None;
    }
}
