//! High-level unredaction API.
//!
//! - `unredact()` - Remove overlay redactions, returning the rewritten file
//! - `unredact_with_report()` - Same, plus counts of what was removed
//! - `unredact_document()` - Apply the pipeline to an already-read document

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::classify::{PageContext, classify_page, form_field_ids};
use crate::document::{PDFDocument, collect_pages, read_document, write_document};
use crate::error::Result;
use crate::geometry::MATRIX_IDENTITY;
use crate::interp::{DEFAULT_MAX_OPERATORS, PageInterpreter, parse_content};
use crate::limits::{Budget, CancellationToken};
use crate::rewrite::{rewrite_page, sweep};

/// Options for one unredaction run.
#[derive(Debug, Clone)]
pub struct UnredactOptions {
    /// Most indirect objects a document may contain.
    pub max_objects: usize,

    /// Largest decoded size of any stream, and of a page's concatenated
    /// content.
    pub max_content_stream_bytes: usize,

    /// Most content operators replayed for one page, counting every
    /// operator of each form XObject invocation.
    pub max_operators: usize,

    /// Slack, in page units, around an overlay when deciding whether it
    /// fully covers a glyph.
    pub tolerance_margin: f64,

    /// Checked before each page, while materializing objects and while
    /// replaying content.
    pub cancellation: Option<CancellationToken>,

    /// Highest header version accepted.
    pub max_pdf_version: f32,

    /// Rebuild the object index by scanning when the xref chain is
    /// unusable.
    pub recover_xref: bool,
}

impl Default for UnredactOptions {
    fn default() -> Self {
        Self {
            max_objects: 500_000,
            max_content_stream_bytes: 64 * 1024 * 1024,
            max_operators: DEFAULT_MAX_OPERATORS,
            tolerance_margin: 1.5,
            cancellation: None,
            max_pdf_version: 2.0,
            recover_xref: false,
        }
    }
}

/// What one run removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnredactReport {
    pub pages_processed: usize,
    pub annotations_removed: usize,
    pub content_ranges_removed: usize,
    pub objects_swept: usize,
}

impl UnredactReport {
    /// `true` when the document was left as it was, orphans aside.
    pub const fn is_unchanged(&self) -> bool {
        self.annotations_removed == 0 && self.content_ranges_removed == 0
    }
}

/// Remove overlay redactions from a PDF.
///
/// Returns a complete single-revision file. Parse-time structural errors
/// abort the run; nothing is written in that case.
///
/// # Example
/// ```ignore
/// use unredact_core::api::{unredact, UnredactOptions};
///
/// let input = std::fs::read("report.pdf")?;
/// let output = unredact(&input, &UnredactOptions::default())?;
/// std::fs::write("report_unredacted.pdf", output)?;
/// ```
pub fn unredact(input: &[u8], options: &UnredactOptions) -> Result<Vec<u8>> {
    unredact_with_report(input, options).map(|(output, _)| output)
}

/// Like [`unredact`], also returning what was removed.
#[instrument(level = "debug", skip_all, fields(input_len = input.len()))]
pub fn unredact_with_report(input: &[u8], options: &UnredactOptions) -> Result<(Vec<u8>, UnredactReport)> {
    let mut doc = read_document(Bytes::copy_from_slice(input), options)?;
    let report = unredact_document(&mut doc, options)?;
    let output = write_document(&doc)?;
    info!(
        pages = report.pages_processed,
        annotations = report.annotations_removed,
        content_ranges = report.content_ranges_removed,
        swept = report.objects_swept,
        output_len = output.len(),
        "unredaction finished"
    );
    Ok((output, report))
}

/// Classify every page of `doc`, apply the marks, then drop unreachable
/// objects.
pub fn unredact_document(doc: &mut PDFDocument, options: &UnredactOptions) -> Result<UnredactReport> {
    let limit = options.max_content_stream_bytes;
    let budget = Budget::new(options.cancellation.clone(), 1);
    let pages = collect_pages(doc)?;
    let form_fields = form_field_ids(doc);
    let mut report = UnredactReport::default();

    // Classification reads the document; edits wait until every page is seen.
    let mut edits = Vec::new();
    for (index, page) in pages.iter().enumerate() {
        budget.check()?;
        let content = page.content_bytes(doc, limit)?;
        let ops = parse_content(&content)?;
        let steps = PageInterpreter::new(doc, page.resources(doc), limit)
            .with_limits(options.max_operators, options.cancellation.clone())
            .replay(&ops, MATRIX_IDENTITY)?;
        let cx = PageContext {
            doc,
            page,
            ops: &ops,
            steps: &steps,
            form_fields: &form_fields,
            margin: options.tolerance_margin,
            limit,
        };
        let marks = classify_page(&cx);
        debug!(page = page.pageid, ops = ops.len(), marks = marks.len(), "page classified");
        report.pages_processed += 1;
        if !marks.is_empty() {
            edits.push((index, content, marks));
        }
    }

    for (index, content, marks) in edits {
        let edit = rewrite_page(doc, &pages[index], &content, &marks)?;
        report.annotations_removed += edit.annotations_removed;
        report.content_ranges_removed += edit.content_ranges_removed;
    }
    report.objects_swept = sweep(doc)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn build_pdf(content: &str) -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>".to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        ];
        let mut out = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_pos = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f\r\n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n\r\n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_pos}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn test_options_defaults() {
        let options = UnredactOptions::default();
        assert_eq!(options.max_objects, 500_000);
        assert_eq!(options.max_content_stream_bytes, 64 << 20);
        assert_eq!(options.max_operators, 1_000_000);
        assert!((options.tolerance_margin - 1.5).abs() < f64::EPSILON);
        assert!(options.cancellation.is_none());
        assert!(!options.recover_xref);
    }

    #[test]
    fn test_box_over_text_removed() {
        let input = build_pdf("BT /F1 12 Tf 100 700 Td (SECRET) Tj ET 0 g 95 690 60 25 re f");
        let (_, report) = unredact_with_report(&input, &UnredactOptions::default()).unwrap();
        assert_eq!(report.pages_processed, 1);
        assert_eq!(report.content_ranges_removed, 2);
        // The original content stream is orphaned by the rewrite
        assert_eq!(report.objects_swept, 1);
    }

    #[test]
    fn test_clean_document_unchanged() {
        let input = build_pdf("BT /F1 12 Tf 100 700 Td (PUBLIC) Tj ET");
        let (_, report) = unredact_with_report(&input, &UnredactOptions::default()).unwrap();
        assert!(report.is_unchanged());
        assert_eq!(report.objects_swept, 0);
    }

    #[test]
    fn test_cancelled_run_fails() {
        let token = CancellationToken::new();
        token.cancel();
        let options = UnredactOptions {
            cancellation: Some(token),
            ..Default::default()
        };
        let input = build_pdf("BT (A) Tj ET");
        let err = unredact(&input, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimitExceeded);
    }

    #[test]
    fn test_report_serializes() {
        let report = UnredactReport {
            pages_processed: 2,
            annotations_removed: 1,
            content_ranges_removed: 3,
            objects_swept: 4,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"pages_processed":2,"annotations_removed":1,"content_ranges_removed":3,"objects_swept":4}"#
        );
    }
}
