//! Container writer.
//!
//! Serializes a [`PDFDocument`] as a single-revision file with a classic
//! cross-reference table.

use super::catalog::{MAX_GENERATION, PDFDocument};
use crate::error::Result;
use crate::model::{PDFDict, PDFObject, PDFStream};
use std::collections::BTreeMap;
use tracing::debug;

/// Binary marker line written after the header.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Trailer keys copied to the output, in this order.
const TRAILER_KEYS: [&str; 3] = ["Root", "Info", "ID"];

/// Serialize `doc`.
///
/// Objects are written in ascending number; numbers without an object get
/// free entries chained from object 0. Output depends only on the document,
/// so writing a re-read copy produces the same bytes.
pub fn write_document(doc: &PDFDocument) -> Result<Vec<u8>> {
    let root = doc.root_ref()?;

    let mut out = Vec::with_capacity(1024);
    out.extend_from_slice(format!("%PDF-{}\n", doc.version()).as_bytes());
    out.extend_from_slice(BINARY_MARKER);

    let mut offsets: BTreeMap<u32, (usize, u32)> = BTreeMap::new();
    for (r, obj) in doc.iter() {
        offsets.insert(r.objid, (out.len(), r.genno));
        out.extend_from_slice(format!("{} {} obj\n", r.objid, r.genno).as_bytes());
        match obj {
            PDFObject::Stream(stream) => write_stream(&mut out, stream),
            other => write_object(&mut out, other),
        }
        out.extend_from_slice(b"\nendobj\n");
    }

    let size = doc.next_objid();
    let free: Vec<u32> = (1..size).filter(|n| !offsets.contains_key(n)).collect();

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    let head = free.first().copied().unwrap_or(0);
    out.extend_from_slice(format!("{head:010} {MAX_GENERATION:05} f\r\n").as_bytes());
    let mut next_free = free.iter().skip(1);
    for objid in 1..size {
        match offsets.get(&objid) {
            Some((offset, genno)) => {
                out.extend_from_slice(format!("{offset:010} {genno:05} n\r\n").as_bytes());
            }
            None => {
                let next = next_free.next().copied().unwrap_or(0);
                let genno = doc.freed().get(&objid).copied().unwrap_or(0);
                out.extend_from_slice(format!("{next:010} {genno:05} f\r\n").as_bytes());
            }
        }
    }

    let mut trailer = PDFDict::new();
    trailer.insert("Size".into(), PDFObject::Int(i64::from(size)));
    for key in TRAILER_KEYS {
        if let Some(value) = doc.trailer().get(key) {
            trailer.insert(key.into(), value.clone());
        }
    }
    trailer.insert("Root".into(), PDFObject::Ref(root));

    out.extend_from_slice(b"trailer\n");
    write_dict(&mut out, &trailer, None);
    out.extend_from_slice(format!("\nstartxref\n{xref_start}\n%%EOF\n").as_bytes());

    debug!(objects = offsets.len(), free = free.len(), bytes = out.len(), "wrote document");
    Ok(out)
}

fn write_stream(out: &mut Vec<u8>, stream: &PDFStream) {
    let data = stream.get_rawdata();
    write_dict(out, &stream.attrs, Some(data.len()));
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
}

/// Write a dictionary. With `length`, `/Length` is written as that direct
/// integer, in its original position or appended.
fn write_dict(out: &mut Vec<u8>, dict: &PDFDict, length: Option<usize>) {
    out.extend_from_slice(b"<<");
    let mut wrote_length = false;
    for (key, value) in dict {
        out.push(b'/');
        write_name(out, key);
        out.push(b' ');
        match length {
            Some(len) if key == "Length" => {
                out.extend_from_slice(len.to_string().as_bytes());
                wrote_length = true;
            }
            _ => write_object(out, value),
        }
        out.push(b' ');
    }
    if let Some(len) = length
        && !wrote_length
    {
        out.extend_from_slice(format!("/Length {len} ").as_bytes());
    }
    out.extend_from_slice(b">>");
}

/// Append the syntax of a direct object.
///
/// Streams can only be written as indirect objects; a stream found in a
/// direct position is written as its dictionary.
pub fn write_object(out: &mut Vec<u8>, obj: &PDFObject) {
    match obj {
        PDFObject::Null => out.extend_from_slice(b"null"),
        PDFObject::Bool(true) => out.extend_from_slice(b"true"),
        PDFObject::Bool(false) => out.extend_from_slice(b"false"),
        PDFObject::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
        PDFObject::Real(v) => out.extend_from_slice(format_real(*v).as_bytes()),
        PDFObject::Name(name) => {
            out.push(b'/');
            write_name(out, name);
        }
        PDFObject::String(bytes) => write_string(out, bytes),
        PDFObject::Array(arr) => {
            out.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        PDFObject::Dict(dict) => write_dict(out, dict, None),
        PDFObject::Stream(stream) => write_dict(out, &stream.attrs, None),
        PDFObject::Ref(r) => out.extend_from_slice(r.to_string().as_bytes()),
    }
}

/// Reals keep a fractional part so they read back as reals; `Display` for
/// `f64` never uses an exponent.
fn format_real(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    for &b in name.as_bytes() {
        let regular = (0x21..=0x7e).contains(&b)
            && !matches!(b, b'#' | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}');
        if regular {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        }
    }
}

fn write_string(out: &mut Vec<u8>, bytes: &[u8]) {
    let binary = bytes
        .iter()
        .filter(|&&b| !(0x20..0x7f).contains(&b) && !matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    if binary * 4 > bytes.len() {
        out.push(b'<');
        for b in bytes {
            out.extend_from_slice(format!("{b:02X}").as_bytes());
        }
        out.push(b'>');
        return;
    }

    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x20..=0x7e => out.push(b),
            _ => out.extend_from_slice(format!("\\{b:03o}").as_bytes()),
        }
    }
    out.push(b')');
}
