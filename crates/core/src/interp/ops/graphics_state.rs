//! Graphics state operators.
//!
//! Handles: q, Q, cm, gs
//!
//! Line styling operators (w, J, j, M, d, ri, i) do not affect what an
//! operator covers and are not tracked.

use crate::error::{PdfError, Result};
use crate::geometry::{Matrix, mult_matrix};
use crate::interp::interpreter::PageInterpreter;

#[allow(non_snake_case)]
impl PageInterpreter<'_> {
    /// Saves the current graphics state to the stack.
    ///
    /// PDF operator: `q`
    pub fn do_q(&mut self) {
        self.gstack.push(self.state.clone());
    }

    /// Restores the graphics state from the stack.
    ///
    /// PDF operator: `Q`
    pub fn do_Q(&mut self) -> Result<()> {
        self.state = self
            .gstack
            .pop()
            .ok_or_else(|| PdfError::MalformedContentStream("Q without matching q".into()))?;
        Ok(())
    }

    /// Concatenates a matrix to the current transformation matrix.
    ///
    /// PDF operator: `cm`
    pub fn do_cm(&mut self, matrix: Matrix) {
        self.state.ctm = mult_matrix(matrix, self.state.ctm);
    }

    /// Applies an `/ExtGState` resource. Only the fill alpha is tracked.
    ///
    /// PDF operator: `gs`
    pub fn do_gs(&mut self, name: &str) {
        let doc = self.doc;
        let Some((_, gs)) = self.lookup("ExtGState", name) else {
            return;
        };
        if let Some(alpha) = gs
            .as_dict()
            .ok()
            .and_then(|d| doc.dict_get(d, "ca"))
            .and_then(|ca| ca.as_num().ok())
        {
            self.state.fill_alpha = alpha.clamp(0.0, 1.0);
        }
    }
}
