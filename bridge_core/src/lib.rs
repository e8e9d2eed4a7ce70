//! Turns a chunked 24 kHz speech stream into a steadily paced 48 kHz track.
//!
//! The pipeline is `SpeechSource -> Upsampler -> LivePublisher -> MediaSink`,
//! driven end to end by [`speak_bridge`].

mod bridge;
mod error;
pub mod loopback;
mod publisher;
pub mod sink;
pub mod upsample;

pub use bridge::{bridge_line, speak_bridge, BridgeReport};
pub use error::{BridgeError, Result};
pub use loopback::{CapturedFrame, LoopbackSink, LoopbackStats};
pub use publisher::{
    apply_fade_out, LivePublisher, PublisherConfig, PublisherState, DEFAULT_TRACK_NAME,
    FRAME_DURATION_MS, OUTPUT_SAMPLE_RATE,
};
pub use sink::{MediaSink, SinkError, TrackHandle, TrackOptions};
pub use upsample::{upsample_2x_linear, Upsampler};
