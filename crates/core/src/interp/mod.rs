//! PDF content stream parsing and replay.
//!
//! This module contains:
//! - `content`: operator/operand grouping with byte ranges
//! - `state`: graphics and text state
//! - `interpreter`: the replay fold producing per-operator state
//! - `ops`: Operator implementations by category

pub mod content;
pub mod interpreter;
pub mod ops;
pub mod state;

// Re-export main types for convenience
pub use content::{ContentOperator, Operands, parse_content};
pub use interpreter::{DEFAULT_MAX_OPERATORS, MAX_FORM_DEPTH, PageInterpreter, Step};
pub use state::{Color, ColorSpace, GraphicsState, TextState};
