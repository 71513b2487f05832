// Base64 image payloads, optionally wrapped in a data URL

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("empty frame payload")]
    Empty,

    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

/// Decode a `frame.data` string into encoded image bytes.
///
/// Accepts bare base64 or a data URL (`data:image/jpeg;base64,...`): anything
/// up to and including the first comma is dropped.
pub fn decode_payload(data: &str) -> Result<Vec<u8>, PayloadError> {
    let body = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };
    let body = body.trim();
    if body.is_empty() {
        return Err(PayloadError::Empty);
    }

    STANDARD
        .decode(body)
        .map_err(|e| PayloadError::Base64(e.to_string()))
}

/// Encode image bytes for the outbound `frame.image` field (no data-URL prefix)
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
