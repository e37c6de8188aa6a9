//! Font handling.
//!
//! - `widths` - glyph advance widths for simple and composite fonts

pub mod widths;

pub use widths::{DEFAULT_GLYPH_WIDTH, FontMetrics};
