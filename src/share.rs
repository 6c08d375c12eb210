//! Shareable state codec.
//!
//! Serializes document text into a compact URL-safe payload (deflate +
//! base64-url) carried in a single fragment parameter, and back. Decoding
//! treats the payload as untrusted: any malformed, truncated, or oversized
//! input yields `None`, never a panic.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

use crate::error::ShareError;

/// Fragment parameter name carrying the encoded document.
pub const FRAGMENT_PARAM: &str = "doc";

/// Conservative cross-browser URL length bound.
pub const SAFE_URL_LENGTH: usize = 2000;

/// Inflation cap for untrusted payloads (zip-bomb guard).
const MAX_DECODED_BYTES: u64 = 4 * 1024 * 1024;

/// Encode document text into a URL-safe payload.
pub fn encode(text: &str) -> Result<String, ShareError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(text.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decode a payload back into document text.
///
/// Returns `None` on any failure: bad base64, corrupt deflate stream,
/// non-UTF-8 output, or a payload inflating past the safety cap.
pub fn decode(payload: &str) -> Option<String> {
    let compressed = URL_SAFE_NO_PAD.decode(payload.trim()).ok()?;

    let mut decoder = DeflateDecoder::new(compressed.as_slice()).take(MAX_DECODED_BYTES + 1);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes).ok()?;
    if bytes.len() as u64 > MAX_DECODED_BYTES {
        return None;
    }

    String::from_utf8(bytes).ok()
}

/// Build a full shareable URL from a base page URL.
pub fn share_url(base: &str, text: &str) -> Result<String, ShareError> {
    Ok(format!("{}#{}={}", base, FRAGMENT_PARAM, encode(text)?))
}

/// Extract and decode the document payload from a URL fragment, if present.
pub fn decode_fragment(fragment: &str) -> Option<String> {
    let fragment = fragment.trim_start_matches('#');
    fragment
        .split('&')
        .find_map(|pair| pair.strip_prefix(&format!("{}=", FRAGMENT_PARAM)))
        .and_then(decode)
}

/// Report whether sharing this text would exceed the practical URL length
/// bound, so callers can warn before producing the link.
pub fn exceeds_safe_length(base: &str, text: &str) -> bool {
    match share_url(base, text) {
        Ok(url) => url.len() > SAFE_URL_LENGTH,
        Err(_) => true,
    }
}
