//! PDF Document module - container reading, object graph, pages and writing.
//!
//! This module contains:
//! - `catalog` - the object table and reference resolution (PDFDocument)
//! - `xref` - classic and stream cross-reference sections
//! - `reader` - loading a document from bytes
//! - `objstm` - object stream expansion
//! - `repair` - xref recovery by scanning
//! - `page` - page tree walking (PDFPage)
//! - `writer` - serialization with a fresh xref table

pub mod catalog;
pub mod objstm;
pub mod page;
pub mod reader;
pub mod repair;
pub mod writer;
pub mod xref;

// Re-export main types for convenience
pub use catalog::{IndirectObject, PDFDocument};
pub use page::{AnnotRef, PDFPage, collect_pages};
pub use reader::read_document;
pub use writer::write_document;
pub use xref::{XRef, XRefEntry};
