//! LZW stream decoder using weezl crate.

use crate::error::Result;
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW-encoded data with EarlyChange setting.
///
/// EarlyChange=1 is the PDF default; EarlyChange=0 uses TIFF size switching.
/// Corrupt input yields the output decoded so far.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let _ = decoder.into_vec(&mut output).decode(data);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weezl::encode::Encoder;

    #[test]
    fn test_lzw_matches_encoder() {
        let input = b"-----A---B-----A---B-----A---B";
        let encoded = Encoder::new(BitOrder::Msb, 8).encode(input).unwrap();
        assert_eq!(lzwdecode_with_earlychange(&encoded, 1).unwrap(), input);
    }

    #[test]
    fn test_lzw_garbage_is_lenient() {
        assert!(lzwdecode_with_earlychange(b"\xff\xff\xff", 1).is_ok());
    }
}
