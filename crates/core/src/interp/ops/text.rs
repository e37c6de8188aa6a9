//! Text operators.
//!
//! Handles: BT, Tf, Td, TD, Tm, T*, Tj, TJ, ', "
//! (Tc, Tw, Tz, TL, Tr and Ts only set a field and are handled inline by
//! the dispatcher.)
//!
//! Text showing does not render anything; it estimates where each glyph
//! lands. A glyph spans its advance horizontally and a fixed fraction of
//! the font size vertically.

use crate::font::{DEFAULT_GLYPH_WIDTH, FontMetrics};
use crate::geometry::{Matrix, apply_matrix_rect, is_degenerate, mult_matrix};
use crate::interp::interpreter::PageInterpreter;
use crate::model::PDFObject;
use std::sync::Arc;

/// Glyph top above the baseline, in em.
pub const GLYPH_ASCENT: f64 = 0.7;
/// Glyph bottom relative to the baseline, in em.
pub const GLYPH_DESCENT: f64 = -0.2;

/// Text render mode that neither fills nor strokes (clip only).
const RENDER_INVISIBLE_CLIP: i64 = 7;

const fn translation(tx: f64, ty: f64) -> Matrix {
    (1.0, 0.0, 0.0, 1.0, tx, ty)
}

#[allow(non_snake_case)]
impl PageInterpreter<'_> {
    /// BT - Begin text object.
    pub const fn do_BT(&mut self) {
        self.state.text.reset();
    }

    /// Tf - Set font and size.
    ///
    /// Metrics of fonts reached by reference are cached per interpreter.
    pub fn do_Tf(&mut self, fontid: &str, fontsize: f64) {
        let doc = self.doc;
        let metrics = match self.lookup("Font", fontid) {
            Some((objid, font)) => match font.as_dict() {
                Ok(dict) => match objid.and_then(|id| self.fonts.get(&id)) {
                    Some(cached) => Some(Arc::clone(cached)),
                    None => {
                        let metrics = Arc::new(FontMetrics::from_dict(doc, dict));
                        if let Some(id) = objid {
                            self.fonts.insert(id, Arc::clone(&metrics));
                        }
                        Some(metrics)
                    }
                },
                Err(_) => None,
            },
            None => None,
        };
        self.state.text.font = metrics;
        self.state.text.fontname = Some(Arc::from(fontid));
        self.state.text.fontsize = fontsize;
    }

    /// Td - Move to the start of the next line, offset by (tx, ty).
    pub fn do_Td(&mut self, tx: f64, ty: f64) {
        let text = &mut self.state.text;
        text.line_matrix = mult_matrix(translation(tx, ty), text.line_matrix);
        text.matrix = text.line_matrix;
    }

    /// TD - Like Td, also setting the leading to -ty.
    pub fn do_TD(&mut self, tx: f64, ty: f64) {
        self.state.text.leading = -ty;
        self.do_Td(tx, ty);
    }

    /// Tm - Set the text matrix and text line matrix.
    pub const fn do_Tm(&mut self, matrix: Matrix) {
        self.state.text.matrix = matrix;
        self.state.text.line_matrix = matrix;
    }

    /// T* - Move to the start of the next line using the leading.
    pub fn do_T_star(&mut self) {
        let leading = self.state.text.leading;
        self.do_Td(0.0, -leading);
    }

    /// ' - Next line, then show.
    pub fn do_quote(&mut self, s: &[u8]) {
        self.do_T_star();
        self.show_string(s);
    }

    /// " - Set word and character spacing, next line, then show.
    pub fn do_doublequote(&mut self, aw: f64, ac: f64, s: &[u8]) {
        self.state.text.wordspace = aw;
        self.state.text.charspace = ac;
        self.do_quote(s);
    }

    /// TJ - Show strings with individual position adjustments.
    pub fn do_TJ(&mut self, seq: &[PDFObject]) {
        for item in seq {
            match item {
                PDFObject::String(s) => self.show_string(s),
                other => {
                    if let Ok(adjust) = other.as_num() {
                        let text = &mut self.state.text;
                        let tx = -adjust / 1000.0 * text.fontsize * text.scaling / 100.0;
                        text.matrix = mult_matrix(translation(tx, 0.0), text.matrix);
                    }
                }
            }
        }
    }

    /// Tj - Show a string, recording one box per glyph and advancing the
    /// text matrix.
    pub fn show_string(&mut self, s: &[u8]) {
        let text = &self.state.text;
        let tfs = text.fontsize;
        let th = text.scaling / 100.0;
        let (tc, tw, rise) = (text.charspace, text.wordspace, text.rise);
        let visible = text.render != RENDER_INVISIBLE_CLIP;
        let font = text.font.clone();
        let composite = font.as_ref().is_some_and(|f| f.is_composite());
        let ctm = self.state.ctm;
        let mut tm = text.matrix;

        let codes: Vec<u32> = match &font {
            Some(f) => f.codes(s).collect(),
            None => s.iter().map(|&b| u32::from(b)).collect(),
        };
        for code in codes {
            let w0 = font.as_ref().map_or(DEFAULT_GLYPH_WIDTH, |f| f.width(code));
            let mut advance = w0 / 1000.0 * tfs + tc;
            if !composite && code == 32 {
                advance += tw;
            }
            advance *= th;

            if visible {
                let bbox = (0.0, rise + GLYPH_DESCENT * tfs, advance, rise + GLYPH_ASCENT * tfs);
                let glyph = apply_matrix_rect(mult_matrix(tm, ctm), bbox);
                if !is_degenerate(glyph) {
                    self.glyphs.push(glyph);
                }
            }
            tm = mult_matrix(translation(advance, 0.0), tm);
        }
        self.state.text.matrix = tm;
    }
}
