//! Public API for unredaction.
//!
//! # Example
//!
//! ```ignore
//! use unredact_core::api::{unredact, UnredactOptions};
//!
//! let input = std::fs::read("document.pdf")?;
//! let output = unredact(&input, &UnredactOptions::default())?;
//! ```

pub mod builder;
pub mod high_level;

// Re-export for convenience
pub use builder::Unredactor;
pub use high_level::{UnredactOptions, UnredactReport, unredact, unredact_document, unredact_with_report};
