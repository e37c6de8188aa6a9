//! Stream filter codecs.
//!
//! This module contains:
//! - `ascii85`: ASCII85 and ASCIIHex decoding
//! - `flate`: zlib/deflate decoding (lenient) and encoding
//! - `lzw`: LZW decompression
//! - `predictor`: PNG and TIFF predictor reversal
//! - `runlength`: Run-length decoding
//! - `filters`: `/Filter` chain evaluation with an output budget

pub mod ascii85;
pub mod filters;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

// Re-export main functions for convenience
pub use ascii85::{ascii85decode, asciihexdecode};
pub use filters::{Filter, decode_filters};
pub use flate::{flate_decode, flate_encode};
pub use lzw::lzwdecode_with_earlychange;
pub use predictor::apply_predictor;
pub use runlength::rldecode;
