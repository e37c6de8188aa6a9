//! Predictor reversal for Flate and LZW streams (`/DecodeParms /Predictor`).

use crate::error::{PdfError, Result};
use crate::model::PDFDict;

fn param(parms: &PDFDict, key: &str, default: i64) -> i64 {
    parms.get(key).and_then(|v| v.as_int().ok()).unwrap_or(default)
}

/// Undo the predictor described by `parms`, if any.
///
/// Predictor 1 is a no-op, 2 is the TIFF horizontal predictor and 10..=15
/// are the PNG row filters (the actual filter is given per row).
pub fn apply_predictor(data: Vec<u8>, parms: &PDFDict) -> Result<Vec<u8>> {
    let predictor = param(parms, "Predictor", 1);
    if predictor <= 1 {
        return Ok(data);
    }

    let columns = param(parms, "Columns", 1);
    let colors = param(parms, "Colors", 1);
    let bits = param(parms, "BitsPerComponent", 8);
    if !(1..=1 << 20).contains(&columns) || !(1..=32).contains(&colors) || ![1, 2, 4, 8, 16].contains(&bits) {
        return Err(PdfError::UnsupportedFeature(format!(
            "predictor parameters Columns={columns} Colors={colors} BitsPerComponent={bits}"
        )));
    }
    let (columns, colors, bits) = (columns as usize, colors as usize, bits as usize);

    match predictor {
        2 => tiff_predictor(data, columns, colors, bits),
        10..=15 => Ok(png_predictor(&data, columns, colors, bits)),
        other => Err(PdfError::UnsupportedFeature(format!("predictor {other}"))),
    }
}

/// Reverse PNG row filtering. Each row carries its own filter byte.
fn png_predictor(data: &[u8], columns: usize, colors: usize, bits_per_component: usize) -> Vec<u8> {
    let row_bytes = (colors * columns * bits_per_component).div_ceil(8);
    let bpp = std::cmp::max(1, colors * bits_per_component / 8); // bytes per pixel
    let row_size = row_bytes + 1; // +1 for filter byte

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    let mut current_row = vec![0u8; row_bytes];

    for row in data.chunks_exact(row_size) {
        let filter_type = row[0];
        let row_data = &row[1..];

        match filter_type {
            1 => {
                // Sub
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                // Up
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                // Average
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] as u16 } else { 0 };
                    let above = prev_row[i] as u16;
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                // Paeth
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(paeth_predictor(left, above, upper_left));
                }
            }
            // None, or unknown filter: copy the data
            _ => current_row.copy_from_slice(row_data),
        }

        result.extend_from_slice(&current_row);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    result
}

/// Paeth predictor function used in PNG filtering.
const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

/// TIFF predictor 2. Only whole-byte components are supported.
fn tiff_predictor(mut data: Vec<u8>, columns: usize, colors: usize, bits: usize) -> Result<Vec<u8>> {
    if bits != 8 {
        return Err(PdfError::UnsupportedFeature(format!(
            "TIFF predictor with {bits} bits per component"
        )));
    }
    let row_bytes = columns * colors;
    for row in data.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PDFObject;

    fn parms(predictor: i64, columns: i64) -> PDFDict {
        let mut d = PDFDict::new();
        d.insert("Predictor".into(), PDFObject::Int(predictor));
        d.insert("Columns".into(), PDFObject::Int(columns));
        d
    }

    #[test]
    fn test_png_up_filter() {
        // Two rows of 3 bytes, second row uses Up
        let data = vec![0, 1, 2, 3, 2, 1, 1, 1];
        let out = apply_predictor(data, &parms(12, 3)).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_filter() {
        let data = vec![1, 5, 1, 1];
        let out = apply_predictor(data, &parms(11, 3)).unwrap();
        assert_eq!(out, vec![5, 6, 7]);
    }

    #[test]
    fn test_tiff_predictor() {
        let data = vec![10, 1, 1, 20, 2, 2];
        let out = apply_predictor(data, &parms(2, 3)).unwrap();
        assert_eq!(out, vec![10, 11, 12, 20, 22, 24]);
    }

    #[test]
    fn test_no_predictor_is_identity() {
        let data = vec![9, 8, 7];
        assert_eq!(apply_predictor(data.clone(), &PDFDict::new()).unwrap(), data);
    }

    #[test]
    fn test_unknown_predictor() {
        assert!(apply_predictor(vec![0], &parms(7, 1)).is_err());
    }
}
