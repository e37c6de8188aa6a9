//! Minimal PDF construction for integration tests.
//!
//! Objects are written in insertion order and the xref table is computed
//! from their real offsets.

#![allow(dead_code)]

use bytes::Bytes;
use unredact_core::UnredactOptions;
use unredact_core::document::{PDFDocument, collect_pages, read_document};

pub struct PdfBuilder {
    version: String,
    objects: Vec<(u32, Vec<u8>)>,
    trailer: String,
    startxref: bool,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.7".into(),
            objects: Vec::new(),
            trailer: String::new(),
            startxref: true,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.into();
        self
    }

    /// Add `id 0 obj <body> endobj`.
    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.objects.push((id, body.as_bytes().to_vec()));
        self
    }

    /// Add a stream object; `/Length` is filled in.
    pub fn stream(mut self, id: u32, extra: &str, data: &[u8]) -> Self {
        let mut body = format!("<< /Length {} {extra} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((id, body));
        self
    }

    /// Extra trailer entries besides `/Size` and `/Root 1 0 R`.
    pub fn trailer(mut self, extra: &str) -> Self {
        self.trailer = extra.into();
        self
    }

    pub fn without_startxref(mut self) -> Self {
        self.startxref = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n%\u{e2}\u{e3}\u{cf}\u{d3}\n", self.version).into_bytes();
        let mut offsets = std::collections::BTreeMap::new();
        for (id, body) in &self.objects {
            offsets.insert(*id, out.len());
            out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let size = offsets.keys().max().map_or(1, |max| max + 1);
        let xref_pos = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f\r\n").as_bytes());
        for id in 1..size {
            match offsets.get(&id) {
                Some(offset) => out.extend_from_slice(format!("{offset:010} 00000 n\r\n").as_bytes()),
                None => out.extend_from_slice(b"0000000000 00001 f\r\n"),
            }
        }
        out.extend_from_slice(format!("trailer\n<< /Size {size} /Root 1 0 R {} >>\n", self.trailer).as_bytes());
        if self.startxref {
            out.extend_from_slice(format!("startxref\n{xref_pos}\n").as_bytes());
        }
        out.extend_from_slice(b"%%EOF\n");
        out
    }
}

/// Append an incremental update to `base`.
///
/// `objects` are written as new revisions, `freed` get free entries, and
/// the update's trailer (`/Root 1 0 R`, `/Prev` and `extra`) chains to the
/// section `base` ends with.
pub fn append_update(base: &[u8], objects: &[(u32, &str)], freed: &[u32], extra: &str) -> Vec<u8> {
    let prev: usize = String::from_utf8_lossy(base)
        .rsplit("startxref")
        .next()
        .and_then(|tail| tail.split_whitespace().next()?.parse().ok())
        .expect("base ends with startxref");

    let mut out = base.to_vec();
    let mut entries = std::collections::BTreeMap::new();
    for (id, body) in objects {
        entries.insert(*id, format!("{:010} 00000 n\r\n", out.len()));
        out.extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    }
    for id in freed {
        entries.insert(*id, "0000000000 00001 f\r\n".to_string());
    }

    let xref_pos = out.len();
    out.extend_from_slice(b"xref\n");
    for (id, entry) in &entries {
        out.extend_from_slice(format!("{id} 1\n{entry}").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Root 1 0 R /Prev {prev} {extra} >>\nstartxref\n{xref_pos}\n%%EOF\n").as_bytes(),
    );
    out
}

/// One US Letter page showing `(SECRET)` at (100, 700) in 12pt, followed
/// by `overlay`.
///
/// Objects: 1 catalog, 2 pages, 3 page, 4 content, 5 font. `page_extra`
/// and `resources_extra` are spliced into the page and resource
/// dictionaries.
pub fn secret_page(overlay: &str, page_extra: &str, resources_extra: &str) -> PdfBuilder {
    let content = format!("BT /F1 12 Tf 100 700 Td (SECRET) Tj ET\n{overlay}\n");
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
                 /Resources << /Font << /F1 5 0 R >> {resources_extra} >> {page_extra} >>"
            ),
        )
        .stream(4, "", content.as_bytes())
        .object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>")
}

pub fn read(data: &[u8]) -> PDFDocument {
    read_document(Bytes::copy_from_slice(data), &UnredactOptions::default()).unwrap()
}

/// Decoded content of the first page.
pub fn first_page_content(doc: &PDFDocument) -> String {
    let pages = collect_pages(doc).unwrap();
    let content = pages[0].content_bytes(doc, 1 << 24).unwrap();
    String::from_utf8_lossy(&content).into_owned()
}
