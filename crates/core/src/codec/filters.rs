//! `/Filter` chain evaluation.

use super::{ascii85decode, asciihexdecode, flate_decode, lzwdecode_with_earlychange, rldecode};
use super::predictor::apply_predictor;
use crate::error::{PdfError, Result};
use crate::model::PDFDict;

/// A stream filter named in `/Filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Flate,
    Lzw,
    AsciiHex,
    Ascii85,
    RunLength,
    /// Image codecs and anything unknown. Decoding these is not supported.
    Other(String),
}

impl Filter {
    /// Parse a filter name, accepting the inline-image abbreviations.
    pub fn from_name(name: &str) -> Self {
        match name {
            "FlateDecode" | "Fl" => Self::Flate,
            "LZWDecode" | "LZW" => Self::Lzw,
            "ASCIIHexDecode" | "AHx" => Self::AsciiHex,
            "ASCII85Decode" | "A85" => Self::Ascii85,
            "RunLengthDecode" | "RL" => Self::RunLength,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Decode `data` through each filter in order, applying predictors from the
/// matching `/DecodeParms` entry. Output larger than `limit` bytes is a
/// resource-limit error.
pub fn decode_filters(
    data: &[u8],
    chain: &[(Filter, Option<&PDFDict>)],
    limit: usize,
) -> Result<Vec<u8>> {
    let mut output = data.to_vec();

    for (filter, parms) in chain {
        output = match filter {
            Filter::Flate => flate_decode(&output, limit)?,
            Filter::Lzw => {
                let early = parms
                    .and_then(|p| p.get("EarlyChange"))
                    .and_then(|v| v.as_int().ok())
                    .unwrap_or(1);
                lzwdecode_with_earlychange(&output, early)?
            }
            Filter::AsciiHex => asciihexdecode(&output)?,
            Filter::Ascii85 => ascii85decode(&output)?,
            Filter::RunLength => rldecode(&output)?,
            Filter::Other(name) => {
                return Err(PdfError::UnsupportedFeature(format!("stream filter /{name}")));
            }
        };

        if matches!(filter, Filter::Flate | Filter::Lzw)
            && let Some(parms) = parms
        {
            output = apply_predictor(output, parms)?;
        }

        if output.len() > limit {
            return Err(PdfError::ResourceLimitExceeded(format!(
                "decoded stream larger than {limit} bytes"
            )));
        }
    }

    Ok(output)
}
