//! zlib stream codec.

use crate::error::{PdfError, Result};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use flate2::{Decompress, FlushDecompress, Status};
use std::io::Write;

/// Decode zlib data, producing at most `limit` bytes.
///
/// Corrupt input yields the output decoded up to the point of failure
/// (truncated streams and bad checksums are common in the wild).
/// Output beyond `limit` is a [`PdfError::ResourceLimitExceeded`].
pub fn flate_decode(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len().saturating_mul(2).min(limit));
    let mut buf = [0u8; 16 * 1024];

    loop {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let input = &data[(before_in as usize).min(data.len())..];
        let res = decoder.decompress(input, &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if out.len() + produced > limit {
            return Err(PdfError::ResourceLimitExceeded(format!(
                "decoded stream larger than {limit} bytes"
            )));
        }
        out.extend_from_slice(&buf[..produced]);
        let consumed = (decoder.total_in() - before_in) as usize;

        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) if produced == 0 && consumed == 0 => break,
            Ok(_) => {}
        }
    }

    Ok(out)
}

/// Compress with zlib at the default level.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .and_then(|()| encoder.finish())
        .map_err(|e| PdfError::InternalInvariantViolation(format!("flate encode: {e}")))
}
