//! Content stream operator implementations.
//!
//! Operators are grouped by category:
//! - `graphics_state` - State stack and transforms (q, Q, cm, gs)
//! - `color` - Fill color space and values (g, rg, k, cs, sc, scn)
//! - `path` - Path construction and painting (m, l, c, v, y, h, re, S, s, f, F, f\*, B, B\*, b, b\*, n, W, W\*)
//! - `text` - Text state and showing (BT, Tf, Td, TD, Tm, T\*, Tj, TJ, ', ")
//! - `xobject` - XObjects (Do)

mod color;
mod graphics_state;
mod path;
mod text;
mod xobject;

pub use text::{GLYPH_ASCENT, GLYPH_DESCENT};
