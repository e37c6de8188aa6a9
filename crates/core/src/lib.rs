//! unredact-core - Remove overlay redactions from PDF files.
//!
//! Many "redacted" PDFs hide text by painting an opaque box, an image or an
//! annotation on top of it while the text itself stays in the file. This
//! crate finds those overlays and writes the document back without them.
//! Everything else on the page is kept byte for byte.
//!
//! The pipeline:
//! - `document`: container reader, page tree walker and container writer
//! - `interp`: content stream parsing and graphics-state replay
//! - `classify`: overlay detection rules
//! - `rewrite`: applies removals and collects orphaned objects
//! - `api`: the public entry points

pub mod api;
pub mod classify;
pub mod codec;
pub mod document;
pub mod error;
pub mod font;
pub mod geometry;
pub mod interp;
pub mod limits;
pub mod model;
pub mod parser;
pub mod rewrite;

pub use api::{UnredactOptions, UnredactReport, Unredactor, unredact, unredact_with_report};
pub use error::{ErrorKind, PdfError, Result};
pub use limits::CancellationToken;
