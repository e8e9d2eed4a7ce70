// Configuration for the realtime synthesis client

use std::time::Duration;

use crate::error::TtsError;

pub const DEFAULT_REALTIME_URL: &str =
    "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview";
pub const DEFAULT_VOICE: &str = "alloy";
pub const DEFAULT_INSTRUCTIONS: &str =
    "You are a helpful assistant. Always respond in English.";

#[derive(Clone)]
pub struct RealtimeTtsConfig {
    pub url: String,
    pub api_key: String,
    pub voice: String,
    /// Session-level instructions sent with `session.update`.
    pub instructions: String,
    pub connect_timeout: Duration,
    /// Deadline for the first audio delta, measured from session start.
    pub no_audio_timeout: Duration,
    /// Capacity of the reader -> consumer chunk channel.
    pub channel_capacity: usize,
}

impl Default for RealtimeTtsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            api_key: String::new(),
            voice: DEFAULT_VOICE.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            connect_timeout: Duration::from_secs(10),
            no_audio_timeout: Duration::from_secs(7),
            channel_capacity: 256,
        }
    }
}

// Hand-written so the API key never lands in logs.
impl std::fmt::Debug for RealtimeTtsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeTtsConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("voice", &self.voice)
            .field("connect_timeout", &self.connect_timeout)
            .field("no_audio_timeout", &self.no_audio_timeout)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl RealtimeTtsConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_no_audio_timeout(mut self, timeout: Duration) -> Self {
        self.no_audio_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn validate(&self) -> Result<(), TtsError> {
        if self.api_key.trim().is_empty() {
            return Err(TtsError::Config("API key is required".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(TtsError::Config("url is required".to_string()));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(TtsError::Config(format!(
                "url must use ws:// or wss://, got {}",
                self.url
            )));
        }
        if self.voice.trim().is_empty() {
            return Err(TtsError::Config("voice cannot be empty".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(TtsError::Config("channel capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}
