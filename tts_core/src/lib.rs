//! Realtime text-to-speech source.
//!
//! Talks to a streaming speech-synthesis endpoint over a websocket and yields
//! the synthesized speech as a lazy sequence of 24 kHz mono PCM16 chunks.

mod config;
mod error;
pub mod pcm;
pub mod protocol;
mod stream;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

pub use config::{RealtimeTtsConfig, DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_URL, DEFAULT_VOICE};
pub use error::{DecodeError, TtsError};
pub use pcm::{decode_pcm16_base64, encode_pcm16_base64};
pub use stream::RealtimeTts;

/// Sample rate of the PCM produced by the realtime endpoint.
pub const SOURCE_SAMPLE_RATE: u32 = 24_000;

/// Lazy, finite sequence of PCM chunks. Ends after the last chunk of a
/// successful session, or after yielding a single error.
pub type PcmStream = Pin<Box<dyn Stream<Item = Result<Vec<i16>, TtsError>> + Send>>;

/// Anything that can turn a line of text into a [`PcmStream`].
#[async_trait]
pub trait SpeechSource: Send + Sync {
    async fn open(&self, text: &str) -> Result<PcmStream, TtsError>;
}
