use thiserror::Error;
use tts_core::TtsError;

use crate::sink::SinkError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl BridgeError {
    /// Whether a later bridging attempt may succeed without changing anything.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Config(_) => false,
            BridgeError::Tts(TtsError::Config(_)) => false,
            BridgeError::Tts(_) => true,
            BridgeError::Sink(SinkError::Unavailable(_)) => true,
            BridgeError::Sink(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
