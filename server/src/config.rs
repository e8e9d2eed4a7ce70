// Configuration for the agent service

use std::time::Duration;

use bridge_core::{PublisherConfig, DEFAULT_TRACK_NAME};
use tts_core::{RealtimeTtsConfig, DEFAULT_REALTIME_URL, DEFAULT_VOICE};

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub realtime_url: String,
    pub voice: String,
    pub track_name: String,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8788,
            openai_api_key: None,
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            track_name: DEFAULT_TRACK_NAME.to_string(),
            request_timeout_secs: 60,
            cors_allowed_origins: None,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("realtime_url", &self.realtime_url)
            .field("voice", &self.voice)
            .field("track_name", &self.track_name)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let realtime_url = non_empty_var("OPENAI_REALTIME_URL").unwrap_or(defaults.realtime_url);
        let voice = non_empty_var("TTS_VOICE").unwrap_or(defaults.voice);
        let track_name = non_empty_var("TRACK_NAME").unwrap_or(defaults.track_name);

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Self {
            port,
            openai_api_key,
            realtime_url,
            voice,
            track_name,
            request_timeout_secs,
            cors_allowed_origins,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Realtime client settings. The key may still be missing here;
    /// `RealtimeTts::new` rejects that.
    pub fn tts_config(&self) -> RealtimeTtsConfig {
        RealtimeTtsConfig::new(
            self.realtime_url.clone(),
            self.openai_api_key.clone().unwrap_or_default(),
        )
        .with_voice(self.voice.clone())
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig::default().with_track_name(self.track_name.clone())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
