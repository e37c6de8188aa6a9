//! PDF tokenizing and object parsing.
//!
//! - `lexer`: byte-level tokenizer with token spans
//! - `object_parser`: PDF object parser (arrays, dicts, references)

pub mod lexer;
pub mod object_parser;

pub use lexer::{Keyword, Lexer, Token};
pub use object_parser::PDFParser;
