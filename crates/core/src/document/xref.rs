//! Cross-reference sections: classic tables and xref streams.

use super::catalog::PDFDocument;
use crate::error::{PdfError, Result};
use crate::model::{PDFDict, PDFStream};
use crate::parser::PDFParser;
use rustc_hash::FxHashMap;

/// Location of an object as recorded by one xref section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free entry; shadows in-use entries from older sections.
    Free { next_gen: u32 },
    /// Object stored at a byte offset in the file.
    InFile { offset: usize, genno: u32 },
    /// Object stored in an object stream.
    Compressed { stream: u32, index: u32 },
}

/// One cross-reference section and its trailer.
#[derive(Debug, Default)]
pub struct XRef {
    pub entries: FxHashMap<u32, XRefEntry>,
    pub trailer: PDFDict,
    /// Built by scanning the file rather than read from the xref chain
    pub is_fallback: bool,
}

impl XRef {
    pub fn new() -> Self {
        Self::default()
    }

    fn offset_of(&self, key: &str) -> Option<usize> {
        self.trailer
            .get(key)
            .and_then(|p| p.as_int().ok())
            .and_then(|n| usize::try_from(n).ok())
    }

    /// `/Prev` offset of the previous section.
    pub fn prev(&self) -> Option<usize> {
        self.offset_of("Prev")
    }

    /// `/XRefStm` offset of a hybrid file's companion xref stream.
    pub fn xref_stm(&self) -> Option<usize> {
        self.offset_of("XRefStm")
    }
}

/// Merge sections ordered newest first. The first entry seen for an object
/// number wins, free entries included.
pub fn merge_sections(sections: &[XRef]) -> FxHashMap<u32, XRefEntry> {
    let mut merged = FxHashMap::default();
    for section in sections {
        for (&objid, &entry) in &section.entries {
            merged.entry(objid).or_insert(entry);
        }
    }
    merged.remove(&0);
    merged
}

fn skip_ws(data: &[u8], mut cursor: usize) -> usize {
    while cursor < data.len() && matches!(data[cursor], b' ' | b'\n' | b'\r' | b'\t' | b'\x0c' | b'\0') {
        cursor += 1;
    }
    cursor
}

fn skip_line(data: &[u8], mut cursor: usize) -> usize {
    while cursor < data.len() && data[cursor] != b'\n' && data[cursor] != b'\r' {
        cursor += 1;
    }
    while cursor < data.len() && (data[cursor] == b'\n' || data[cursor] == b'\r') {
        cursor += 1;
    }
    cursor
}

/// Read an unsigned decimal number, return (value, bytes_consumed).
fn read_number(data: &[u8], pos: usize) -> Result<(u64, usize)> {
    let digits = data[pos.min(data.len())..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return Err(PdfError::MalformedContainer(format!(
            "expected number in xref table at offset {pos}"
        )));
    }
    let value = std::str::from_utf8(&data[pos..pos + digits])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PdfError::MalformedContainer(format!("xref number too large at offset {pos}")))?;
    Ok((value, digits))
}

/// Parse a classic `xref` table starting at `pos` (pointing at `xref`).
pub fn parse_classic(data: &[u8], pos: usize) -> Result<XRef> {
    let mut xref = XRef::new();
    let mut cursor = skip_ws(data, pos + 4);

    // Subsections until "trailer"
    loop {
        cursor = skip_ws(data, cursor);
        if cursor >= data.len() {
            return Err(PdfError::MalformedContainer("xref table without trailer".into()));
        }
        if data[cursor..].starts_with(b"trailer") {
            cursor += 7;
            break;
        }

        let (start_objid, consumed) = read_number(data, cursor)?;
        cursor = skip_ws(data, cursor + consumed);
        let (count, consumed) = read_number(data, cursor)?;
        cursor = skip_line(data, cursor + consumed);

        if count > (data.len() / 18) as u64 {
            return Err(PdfError::MalformedContainer(format!(
                "xref subsection claims {count} entries"
            )));
        }

        let mut base_objid = start_objid;
        for i in 0..count {
            cursor = skip_ws(data, cursor);
            let (offset, consumed) = read_number(data, cursor)?;
            cursor = skip_ws(data, cursor + consumed);
            let (genno, consumed) = read_number(data, cursor)?;
            cursor = skip_ws(data, cursor + consumed);
            let marker = data.get(cursor).copied().ok_or_else(|| {
                PdfError::MalformedContainer("truncated xref entry".into())
            })?;
            cursor = skip_line(data, cursor + 1);

            // Some writers start a subsection at 1 but still include the
            // object 0 free entry (0000000000 65535 f).
            if i == 0 && base_objid > 0 && marker == b'f' && offset == 0 && genno == 65535 {
                base_objid -= 1;
            }

            let objid = u32::try_from(base_objid + i)
                .map_err(|_| PdfError::MalformedContainer("xref object number out of range".into()))?;
            let genno = u32::try_from(genno).unwrap_or(u32::MAX);

            let entry = match marker {
                b'n' => XRefEntry::InFile {
                    offset: offset as usize,
                    genno,
                },
                b'f' => XRefEntry::Free { next_gen: genno },
                other => {
                    return Err(PdfError::MalformedContainer(format!(
                        "bad xref entry marker {:?} for object {objid}",
                        other as char
                    )));
                }
            };
            xref.entries.insert(objid, entry);
        }
    }

    cursor = skip_ws(data, cursor);
    let mut parser = PDFParser::at(data, cursor);
    xref.trailer = parser
        .parse_object()
        .ok()
        .and_then(|obj| obj.as_dict().ok().cloned())
        .ok_or_else(|| PdfError::MalformedContainer("unparseable trailer dictionary".into()))?;

    Ok(xref)
}

fn read_bytes_as_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |val, &b| (val << 8) | b as u64)
}

fn dict_usize(dict: &PDFDict, key: &str) -> Result<usize> {
    dict.get(key)
        .and_then(|v| v.as_int().ok())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| PdfError::MalformedContainer(format!("xref stream /{key} missing or invalid")))
}

/// Build an xref section from an already-parsed `/Type /XRef` stream.
pub fn parse_stream(doc: &PDFDocument, stream: &PDFStream, limit: usize) -> Result<XRef> {
    let widths: Vec<usize> = stream
        .get("W")
        .and_then(|w| w.as_array().ok())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_int().ok())
                .filter_map(|n| usize::try_from(n).ok())
                .collect()
        })
        .unwrap_or_default();
    let &[w0, w1, w2] = widths.as_slice() else {
        return Err(PdfError::MalformedContainer("xref stream /W must have 3 entries".into()));
    };
    if w0 > 8 || w1 > 8 || w2 > 8 {
        return Err(PdfError::MalformedContainer("xref stream field too wide".into()));
    }
    let entry_size = w0 + w1 + w2;
    let size = dict_usize(&stream.attrs, "Size")?;

    // Index defaults to [0 Size]
    let index: Vec<(u64, u64)> = match stream.get("Index").and_then(|i| i.as_array().ok()) {
        Some(arr) => arr
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_int().ok()? as u64, pair[1].as_int().ok()? as u64)))
            .collect(),
        None => vec![(0, size as u64)],
    };

    let data = doc.decode_stream(stream, limit)?;

    let mut xref = XRef::new();
    let mut rows = data.chunks_exact(entry_size.max(1));

    'sections: for (start_objid, count) in index {
        for i in 0..count {
            let Some(row) = rows.next() else { break 'sections };
            let Ok(objid) = u32::try_from(start_objid + i) else { break 'sections };

            // Type defaults to 1 when its field is absent
            let obj_type = if w0 > 0 { read_bytes_as_int(&row[..w0]) } else { 1 };
            let field1 = read_bytes_as_int(&row[w0..w0 + w1]);
            let field2 = read_bytes_as_int(&row[w0 + w1..entry_size]);

            let entry = match obj_type {
                0 => XRefEntry::Free {
                    next_gen: field2.min(u32::MAX as u64) as u32,
                },
                1 => XRefEntry::InFile {
                    offset: field1 as usize,
                    genno: field2.min(u32::MAX as u64) as u32,
                },
                2 => XRefEntry::Compressed {
                    stream: field1.min(u32::MAX as u64) as u32,
                    index: field2.min(u32::MAX as u64) as u32,
                },
                // Unknown types are references to the null object
                _ => continue,
            };
            xref.entries.insert(objid, entry);
        }
    }

    // The stream dictionary doubles as the trailer
    for (key, value) in &stream.attrs {
        if !matches!(
            key.as_str(),
            "Length" | "Filter" | "DecodeParms" | "W" | "Index" | "Type"
        ) {
            xref.trailer.insert(key.clone(), value.clone());
        }
    }

    Ok(xref)
}
