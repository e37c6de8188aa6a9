//! Builder pattern for unredaction.
//!
//! Provides a fluent API over [`UnredactOptions`].
//!
//! # Example
//! ```ignore
//! use unredact_core::api::Unredactor;
//!
//! let output = Unredactor::new()
//!     .tolerance_margin(2.0)
//!     .recover_xref(true)
//!     .unredact(&input)?;
//! ```

use crate::error::Result;
use crate::limits::CancellationToken;

use super::high_level::{UnredactOptions, UnredactReport, unredact, unredact_with_report};

/// A builder for configuring an unredaction run.
#[derive(Debug, Clone, Default)]
pub struct Unredactor {
    options: UnredactOptions,
}

impl Unredactor {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the most indirect objects a document may contain.
    pub fn max_objects(mut self, max: usize) -> Self {
        self.options.max_objects = max;
        self
    }

    /// Sets the largest decoded stream size, in bytes.
    pub fn max_content_stream_bytes(mut self, max: usize) -> Self {
        self.options.max_content_stream_bytes = max;
        self
    }

    /// Sets the most content operators replayed for one page.
    pub fn max_operators(mut self, max: usize) -> Self {
        self.options.max_operators = max;
        self
    }

    /// Sets the containment slack around overlays, in page units.
    ///
    /// Negative values are treated as zero.
    pub fn tolerance_margin(mut self, margin: f64) -> Self {
        self.options.tolerance_margin = margin.max(0.0);
        self
    }

    /// Attaches a token that can stop the run from another thread.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.options.cancellation = Some(token);
        self
    }

    /// Sets the highest header version accepted.
    pub fn max_pdf_version(mut self, version: f32) -> Self {
        self.options.max_pdf_version = version;
        self
    }

    /// Enables rebuilding a broken object index by scanning the file.
    pub fn recover_xref(mut self, enabled: bool) -> Self {
        self.options.recover_xref = enabled;
        self
    }

    /// The configured options.
    pub const fn options(&self) -> &UnredactOptions {
        &self.options
    }

    pub fn build(self) -> UnredactOptions {
        self.options
    }

    /// Runs [`unredact`] with the configured options.
    pub fn unredact(&self, input: &[u8]) -> Result<Vec<u8>> {
        unredact(input, &self.options)
    }

    /// Runs [`unredact_with_report`] with the configured options.
    pub fn unredact_with_report(&self, input: &[u8]) -> Result<(Vec<u8>, UnredactReport)> {
        unredact_with_report(input, &self.options)
    }
}
