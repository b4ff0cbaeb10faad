//! Diagram source to URL token encoding.
//!
//! The token addresses a diagram on a `PlantUML` server:
//!
//! ```text
//! utf-8 bytes -> zlib compress -> strip 2-byte header and 4-byte trailer
//!             -> base64 -> remap A-Za-z0-9+/ onto 0-9A-Za-z-_
//! ```
//!
//! The remap is a position-for-position substitution between two 64-symbol
//! alphabets, so the token only contains characters safe in a URL path.

use std::io::{Read, Write};

use base64::Engine;
use base64::prelude::BASE64_STANDARD_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::ZlibEncoder;

const ZLIB_HEADER_LEN: usize = 2;
const ZLIB_TRAILER_LEN: usize = 4;

const BASE64_SYMBOLS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PLANTUML_SYMBOLS: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// Byte lookup table mapping `from[i]` to `to[i]`; every other byte maps to 0.
const fn symbol_table(from: &[u8; 64], to: &[u8; 64]) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 64 {
        table[from[i] as usize] = to[i];
        i += 1;
    }
    table
}

const TO_PLANTUML: [u8; 256] = symbol_table(BASE64_SYMBOLS, PLANTUML_SYMBOLS);
const FROM_PLANTUML: [u8; 256] = symbol_table(PLANTUML_SYMBOLS, BASE64_SYMBOLS);

/// Token encoding or decoding error.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
    #[error("compressed stream shorter than zlib framing")]
    Truncated,
    #[error("invalid token symbol {0:?}")]
    InvalidSymbol(char),
    #[error("base64 decoding failed: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("inflating token failed: {0}")]
    Inflate(#[source] std::io::Error),
}

/// Encode flattened diagram source into a server token.
///
/// # Errors
///
/// Returns [`EncodeError`] if compression fails.
pub fn encode_source(source: &str) -> Result<String, EncodeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(source.as_bytes())
        .map_err(EncodeError::Compress)?;
    let compressed = encoder.finish().map_err(EncodeError::Compress)?;

    let end = compressed.len().saturating_sub(ZLIB_TRAILER_LEN);
    let deflate_block = compressed
        .get(ZLIB_HEADER_LEN..end)
        .ok_or(EncodeError::Truncated)?;

    let token = BASE64_STANDARD_NO_PAD
        .encode(deflate_block)
        .bytes()
        .map(|b| char::from(TO_PLANTUML[usize::from(b)]))
        .collect();
    Ok(token)
}

/// Encode source, degrading to an empty token when encoding fails.
///
/// One broken diagram must not stop the batch; the failure is logged and the
/// empty token lets rendering proceed (and fail on its own terms).
#[must_use]
pub fn encode_or_empty(source: &str) -> String {
    encode_source(source).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to encode diagram source");
        String::new()
    })
}

/// Decode a server token back into diagram source.
///
/// # Errors
///
/// Returns [`EncodeError`] if the token contains symbols outside the token
/// alphabet, is not valid base64, or does not inflate to UTF-8 text.
pub fn decode_token(token: &str) -> Result<String, EncodeError> {
    let symbols: Vec<u8> = token
        .chars()
        .map(|c| {
            u8::try_from(c)
                .ok()
                .map(|b| FROM_PLANTUML[usize::from(b)])
                .filter(|&b| b != 0)
                .ok_or(EncodeError::InvalidSymbol(c))
        })
        .collect::<Result<_, _>>()?;

    let deflate_block = BASE64_STANDARD_NO_PAD.decode(&symbols)?;

    let mut source = String::new();
    DeflateDecoder::new(deflate_block.as_slice())
        .read_to_string(&mut source)
        .map_err(EncodeError::Inflate)?;
    Ok(source)
}
