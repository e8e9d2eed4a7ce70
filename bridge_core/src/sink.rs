//! The media transport capability the publisher writes into.
//!
//! A sink publishes audio tracks and accepts fixed-size frames for them. The
//! real implementation lives outside this crate (a room connection); the
//! publisher only ever talks to this trait.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The transport cannot take a track right now (e.g. no local participant).
    #[error("Media sink unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown track {0}")]
    UnknownTrack(Uuid),

    #[error("Frame capture failed: {0}")]
    Capture(String),
}

/// Shape of a track to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackOptions {
    pub sample_rate: u32,
    pub channels: u16,
    /// How much audio the transport may queue ahead of playout.
    pub queue_size_ms: u32,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            queue_size_ms: 5_000,
        }
    }
}

/// A published track. Only the sink that issued it knows what it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackHandle {
    pub id: Uuid,
    pub name: String,
    pub options: TrackOptions,
}

impl TrackHandle {
    pub fn new(name: impl Into<String>, options: TrackOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            options,
        }
    }
}

#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Create and publish an audio track.
    async fn acquire_track(&self, name: &str, options: TrackOptions) -> Result<TrackHandle, SinkError>;

    /// Queue one frame for transmission. May apply backpressure.
    async fn capture(&self, track: &TrackHandle, frame: &[i16]) -> Result<(), SinkError>;

    /// Resolve once everything queued on `track` has been played out.
    async fn wait_for_playout(&self, track: &TrackHandle) -> Result<(), SinkError>;

    /// Unpublish the track and free its audio source.
    async fn release(&self, track: TrackHandle) -> Result<(), SinkError>;
}
