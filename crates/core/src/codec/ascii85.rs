//! ASCII85 and ASCIIHex stream decoders.

use crate::error::Result;

/// Decode ASCII85-encoded data (PDF variant).
/// Handles: z-encoding, <~ ~> markers, whitespace, missing EOD.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    // Strip <~ prefix if present
    let data = data.strip_prefix(b"<~").unwrap_or(data);

    // Find ~> end marker, strip trailing junk
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    // Filter whitespace and expand 'z'
    let mut filtered = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'z' => filtered.extend_from_slice(b"!!!!!"), // z = 4 zero bytes
            b'!'..=b'u' => filtered.push(byte),
            _ => {}
        }
    }

    let mut result = Vec::with_capacity(filtered.len() / 5 * 4 + 4);
    for chunk in filtered.chunks(5) {
        let mut padded = [b'u'; 5];
        padded[..chunk.len()].copy_from_slice(chunk);
        let value = padded
            .iter()
            .fold(0u32, |acc, &byte| acc.wrapping_mul(85).wrapping_add((byte - b'!') as u32));
        let bytes = value.to_be_bytes();
        if chunk.len() == 5 {
            result.extend_from_slice(&bytes);
        } else if chunk.len() > 1 {
            result.extend_from_slice(&bytes[..chunk.len() - 1]);
        }
    }

    Ok(result)
}

/// Decode ASCIIHex-encoded data.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if let Some(nibble) = hex_nibble(byte) {
            if let Some(high) = pending.take() {
                result.push((high << 4) | nibble);
            } else {
                pending = Some(nibble);
            }
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }

    Ok(result)
}

const fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii85decode() {
        assert_eq!(ascii85decode(b"9jqo^BlbD-BleB1DJ+*+F(f,q").unwrap(), b"Man is distinguished");
        assert_eq!(ascii85decode(b"E,9)oF*2M7/c~>").unwrap(), b"pleasure.");
    }

    #[test]
    fn test_ascii85decode_z_and_markers() {
        assert_eq!(ascii85decode(b"<~z~>").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_asciihexdecode() {
        assert_eq!(asciihexdecode(b"61 62 2e6364   65").unwrap(), b"ab.cde");
        assert_eq!(asciihexdecode(b"61 62 2e6364   657>").unwrap(), b"ab.cdep");
        assert_eq!(asciihexdecode(b"7>").unwrap(), b"p");
    }
}
