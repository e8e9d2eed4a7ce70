//! PCM16 payload codec for `response.audio.delta` messages.
//!
//! The realtime endpoint ships little-endian signed 16-bit mono samples,
//! base64 encoded, one delta per message.
use base64::{engine::general_purpose, Engine as _};

use crate::error::DecodeError;

/// Decode a base64 PCM16 payload into samples.
///
/// Empty and odd-length payloads are rejected; callers treat the error as a
/// dropped chunk rather than a broken session.
pub fn decode_pcm16_base64(b64: &str) -> Result<Vec<i16>, DecodeError> {
    let bytes = general_purpose::STANDARD.decode(b64)?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Encode samples as a base64 PCM16 payload (the inverse of [`decode_pcm16_base64`]).
pub fn encode_pcm16_base64(samples: &[i16]) -> String {
    let mut out = Vec::<u8>::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    general_purpose::STANDARD.encode(out)
}
