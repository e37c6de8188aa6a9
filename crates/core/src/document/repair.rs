//! Xref recovery by scanning the file for object headers.
//!
//! Only used when the caller opts in and the xref chain itself is
//! unreadable; a file without `startxref` is never repaired.

use super::xref::{XRef, XRefEntry};
use crate::error::{PdfError, Result};
use crate::parser::PDFParser;
use regex::bytes::Regex;
use tracing::debug;

/// Build a single xref section from every `N G obj` header in `data`.
///
/// Later headers for the same object number win, matching the order in
/// which incremental updates append objects. The trailer is the last
/// parseable `trailer` dictionary, if any.
pub fn rebuild_xref(data: &[u8]) -> Result<XRef> {
    let re = Regex::new(r"(?m)(?:^|[\s%])(\d{1,10})\s+(\d{1,5})\s+obj\b")
        .map_err(|e| PdfError::InternalInvariantViolation(format!("recovery pattern: {e}")))?;

    let mut xref = XRef::new();
    xref.is_fallback = true;

    for cap in re.captures_iter(data) {
        let (Some(num), Some(gen_)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let parse = |m: regex::bytes::Match<'_>| {
            std::str::from_utf8(m.as_bytes())
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
        };
        let (Some(objid), Some(genno)) = (parse(num), parse(gen_)) else {
            continue;
        };
        if objid == 0 {
            continue;
        }
        xref.entries.insert(
            objid,
            XRefEntry::InFile {
                offset: num.start(),
                genno,
            },
        );
    }

    if xref.entries.is_empty() {
        return Err(PdfError::MalformedContainer("no objects found while recovering xref".into()));
    }

    let needle = b"trailer";
    let mut search_end = data.len();
    while let Some(pos) = data[..search_end].windows(needle.len()).rposition(|w| w == needle) {
        let mut parser = PDFParser::at(data, pos + needle.len());
        if let Ok(obj) = parser.parse_object()
            && let Ok(dict) = obj.as_dict()
        {
            xref.trailer = dict.clone();
            break;
        }
        search_end = pos;
    }

    // Recovered tables have no revision history
    xref.trailer.shift_remove("Prev");
    xref.trailer.shift_remove("XRefStm");

    debug!(objects = xref.entries.len(), "recovered xref by scanning");
    Ok(xref)
}
