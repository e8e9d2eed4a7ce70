//! Realtime API message shapes.
//!
//! Only the subset the bridge needs is modelled. Inbound messages with an
//! unknown `type` deserialize to [`ServerEvent::Other`]; messages that do not
//! match the expected shape at all fail to parse and are ignored upstream.

use serde::{Deserialize, Serialize};

pub const MODALITIES: [&str; 2] = ["audio", "text"];

/// Messages the client sends after the handshake.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent<'a> {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig<'a> },

    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseConfig<'a> },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig<'a> {
    pub modalities: &'a [&'a str],
    pub voice: &'a str,
    pub instructions: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseConfig<'a> {
    pub modalities: &'a [&'a str],
    pub instructions: String,
}

impl<'a> ClientEvent<'a> {
    pub fn session_update(voice: &'a str, instructions: &'a str) -> Self {
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: &MODALITIES,
                voice,
                instructions,
            },
        }
    }

    /// Ask the model to speak `text` verbatim.
    pub fn speak(text: &str) -> Self {
        ClientEvent::ResponseCreate {
            response: ResponseConfig {
                modalities: &MODALITIES,
                instructions: format!("Speak this text in English: {text}"),
            },
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing these borrowed structs cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Messages received from the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    #[serde(rename = "response.audio.done")]
    AudioDone {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Option<serde_json::Value>,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<serde_json::Value>,
    },

    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Parse a text frame; `None` when it is not a protocol message we understand.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}
