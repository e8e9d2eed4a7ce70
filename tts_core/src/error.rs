use std::time::Duration;

use thiserror::Error;

/// Failures of a realtime synthesis session.
///
/// Every variant is fatal to the bridging attempt that produced it. Payload
/// decoding problems are reported separately through [`DecodeError`] because
/// they never end a session.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Handshake failed or did not complete within the connect timeout.
    #[error("Realtime TTS connect failed: {0}")]
    Connect(String),

    #[error("Realtime TTS returned no audio within {}s", .0.as_secs_f32())]
    NoAudioTimeout(Duration),

    /// The session ended (done, error or close) before any audio arrived.
    #[error("Realtime TTS returned no audio")]
    NoAudio,
}

impl TtsError {
    /// Short machine-readable label, used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TtsError::Config(_) => "config",
            TtsError::Connect(_) => "connect",
            TtsError::NoAudioTimeout(_) => "no_audio_timeout",
            TtsError::NoAudio => "no_audio",
        }
    }
}

/// A malformed `response.audio.delta` payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("empty audio payload")]
    Empty,

    #[error("odd PCM16 payload length: {0} bytes")]
    OddLength(usize),
}
