//! Paced frame publisher.
//!
//! Takes 24 kHz PCM chunks as they arrive, upsamples them to 48 kHz, slices
//! the result into 20 ms frames and hands each frame to the media sink no
//! earlier than its slot on a clock anchored at the first frame. Falling
//! behind is allowed (frames go out back to back until caught up); running
//! ahead is not.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tts_core::SOURCE_SAMPLE_RATE;

use crate::error::{BridgeError, Result};
use crate::sink::{MediaSink, SinkError, TrackHandle, TrackOptions};
use crate::upsample::Upsampler;

pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
pub const FRAME_DURATION_MS: u32 = 20;
pub const DEFAULT_TRACK_NAME: &str = "continuity-realtime";

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub source_sample_rate: u32,
    pub output_sample_rate: u32,
    pub frame_duration_ms: u32,
    /// Track name used when `push` has to start the publisher itself.
    pub track_name: String,
    pub queue_size_ms: u32,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            source_sample_rate: SOURCE_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            frame_duration_ms: FRAME_DURATION_MS,
            track_name: DEFAULT_TRACK_NAME.to_string(),
            queue_size_ms: 5_000,
        }
    }
}

impl PublisherConfig {
    pub fn with_track_name(mut self, name: impl Into<String>) -> Self {
        self.track_name = name.into();
        self
    }

    /// Samples per frame at the output rate (960 for 20 ms at 48 kHz).
    pub fn frame_samples(&self) -> usize {
        (u64::from(self.output_sample_rate) * u64::from(self.frame_duration_ms) / 1000) as usize
    }

    pub fn track_options(&self) -> TrackOptions {
        TrackOptions {
            sample_rate: self.output_sample_rate,
            channels: 1,
            queue_size_ms: self.queue_size_ms,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_sample_rate == 0 || self.output_sample_rate != 2 * self.source_sample_rate {
            return Err(BridgeError::Config(format!(
                "only exact 2x upsampling is supported ({} Hz -> {} Hz requested)",
                self.source_sample_rate, self.output_sample_rate
            )));
        }
        if self.frame_samples() == 0 {
            return Err(BridgeError::Config(format!(
                "frame duration {}ms yields an empty frame",
                self.frame_duration_ms
            )));
        }
        if self.track_name.trim().is_empty() {
            return Err(BridgeError::Config("track name cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherState {
    Unstarted,
    Started,
    Stopped,
}

/// Wall-clock schedule for one stretch of continuous playback.
#[derive(Debug, Default)]
struct PlaybackClock {
    anchor: Option<Instant>,
    samples_played: u64,
}

impl PlaybackClock {
    /// Time to wait before the next frame is due. The first call anchors the clock.
    fn delay_for_next_frame(&mut self, sample_rate: u32) -> Duration {
        let anchor = *self.anchor.get_or_insert_with(Instant::now);
        let expected_ns =
            u128::from(self.samples_played) * 1_000_000_000 / u128::from(sample_rate.max(1));
        let expected = Duration::from_nanos(expected_ns as u64);
        expected.saturating_sub(anchor.elapsed())
    }

    fn advance(&mut self, samples: usize) {
        self.samples_played += samples as u64;
    }

    fn reset(&mut self) {
        self.anchor = None;
        self.samples_played = 0;
    }
}

/// Everything that belongs to one publishing session.
#[derive(Debug, Default)]
struct SessionState {
    clock: PlaybackClock,
    upsampler: Upsampler,
    fifo: Vec<i16>,
}

impl SessionState {
    fn reset(&mut self) {
        self.clock.reset();
        self.upsampler.reset();
        self.fifo.clear();
    }
}

/// Scale `tail` linearly down toward silence: sample `i` of `n` keeps
/// `(n - i) / n` of its amplitude, truncated toward zero.
pub fn apply_fade_out(tail: &mut [i16]) {
    let n = tail.len() as i64;
    for (i, s) in tail.iter_mut().enumerate() {
        *s = (i64::from(*s) * (n - i as i64) / n) as i16;
    }
}

/// Publishes a single audio track fed with 24 kHz TTS chunks.
///
/// Callers serialise access: at most one `push`/`flush`/`stop` in flight.
pub struct LivePublisher {
    sink: Arc<dyn MediaSink>,
    config: PublisherConfig,
    frame_samples: usize,
    state: PublisherState,
    track: Option<TrackHandle>,
    session: SessionState,
    frames_emitted: u64,
}

impl LivePublisher {
    pub fn new(sink: Arc<dyn MediaSink>, config: PublisherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sink,
            frame_samples: config.frame_samples(),
            config,
            state: PublisherState::Unstarted,
            track: None,
            session: SessionState::default(),
            frames_emitted: 0,
        })
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn track(&self) -> Option<&TrackHandle> {
        self.track.as_ref()
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Samples waiting in the FIFO for a complete frame.
    pub fn buffered_samples(&self) -> usize {
        self.session.fifo.len()
    }

    /// Frames handed to the sink over the publisher's lifetime.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Publish the track. No-op while already started.
    pub async fn start(&mut self, track_name: &str) -> Result<()> {
        if self.state == PublisherState::Started && self.track.is_some() {
            return Ok(());
        }

        let track = self
            .sink
            .acquire_track(track_name, self.config.track_options())
            .await?;
        info!(track = %track.name, id = %track.id, "Published audio track");

        self.track = Some(track);
        self.session.reset();
        self.state = PublisherState::Started;
        Ok(())
    }

    /// Push one 24 kHz chunk and emit every complete frame it produces.
    /// Returns the number of frames emitted.
    pub async fn push(&mut self, pcm24: &[i16]) -> Result<usize> {
        if self.state != PublisherState::Started || self.track.is_none() {
            let name = self.config.track_name.clone();
            self.start(&name).await?;
        }

        let upsampled = self.session.upsampler.process(pcm24);
        self.session.fifo.extend_from_slice(&upsampled);

        let mut frames = 0;
        while self.session.fifo.len() >= self.frame_samples {
            let frame: Vec<i16> = self.session.fifo.drain(..self.frame_samples).collect();
            self.emit_frame(&frame).await?;
            frames += 1;
        }
        Ok(frames)
    }

    /// Emit whatever is buffered, faded out and padded to a whole frame, then
    /// wait for the sink to play everything out. The track stays published,
    /// and the playback clock and upsampler carry run on until `stop`.
    pub async fn flush(&mut self) -> Result<()> {
        self.drain_tail().await
    }

    /// Flush, then unpublish the track. Release failures are logged and
    /// ignored; the flush result is returned.
    pub async fn stop(&mut self) -> Result<()> {
        let flushed = self.flush().await;

        if let Some(track) = self.track.take() {
            let id = track.id;
            match self.sink.release(track).await {
                Ok(()) => info!(%id, "Unpublished audio track"),
                Err(e) => warn!(%id, "Failed to release track: {e}"),
            }
        }

        self.session.reset();
        self.state = PublisherState::Stopped;
        flushed
    }

    async fn drain_tail(&mut self) -> Result<()> {
        let mut tail = std::mem::take(&mut self.session.fifo);

        if !tail.is_empty() {
            let partial = tail.len() % self.frame_samples;
            if partial > 0 {
                let start = tail.len() - partial;
                apply_fade_out(&mut tail[start..]);
            }
            debug!(samples = tail.len(), "Flushing tail");

            for chunk in tail.chunks(self.frame_samples) {
                if chunk.len() == self.frame_samples {
                    self.emit_frame(chunk).await?;
                } else {
                    let mut padded = vec![0i16; self.frame_samples];
                    padded[..chunk.len()].copy_from_slice(chunk);
                    self.emit_frame(&padded).await?;
                }
            }
        }

        if let Some(track) = &self.track {
            self.sink.wait_for_playout(track).await?;
        }
        Ok(())
    }

    /// Capture one frame no earlier than its slot on the playback clock.
    async fn emit_frame(&mut self, frame: &[i16]) -> Result<()> {
        let Some(track) = self.track.as_ref() else {
            return Err(SinkError::Unavailable("no published track".to_string()).into());
        };

        let delay = self
            .session
            .clock
            .delay_for_next_frame(self.config.output_sample_rate);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.sink.capture(track, frame).await?;
        self.session.clock.advance(frame.len());
        self.frames_emitted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackSink;

    fn publisher(sink: &Arc<LoopbackSink>) -> LivePublisher {
        LivePublisher::new(sink.clone(), PublisherConfig::default()).unwrap()
    }

    #[test]
    fn test_default_frame_is_960_samples() {
        assert_eq!(PublisherConfig::default().frame_samples(), 960);
    }

    #[test]
    fn test_config_rejects_non_2x_ratio() {
        let config = PublisherConfig {
            output_sample_rate: 44_100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let config = PublisherConfig {
            frame_duration_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fade_out_ramps_to_zero() {
        let mut tail = vec![1000i16; 4];
        apply_fade_out(&mut tail);
        assert_eq!(tail, vec![1000, 750, 500, 250]);

        let mut negative = vec![-999i16; 3];
        apply_fade_out(&mut negative);
        assert_eq!(negative, vec![-999, -666, -333]);

        let mut empty: Vec<i16> = Vec::new();
        apply_fade_out(&mut empty);
        assert!(empty.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let sink = Arc::new(LoopbackSink::new());
        let mut publisher = publisher(&sink);
        assert_eq!(publisher.state(), PublisherState::Unstarted);

        publisher.start("bridge").await.unwrap();
        let id = publisher.track().unwrap().id;
        publisher.start("bridge").await.unwrap();

        assert_eq!(publisher.track().unwrap().id, id);
        assert_eq!(sink.stats().tracks_published, 1);
        assert_eq!(publisher.state(), PublisherState::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_when_sink_unavailable() {
        let sink = Arc::new(LoopbackSink::new());
        sink.set_connected(false);
        let mut publisher = publisher(&sink);

        let err = publisher.start("bridge").await.unwrap_err();
        assert!(matches!(err, BridgeError::Sink(SinkError::Unavailable(_))));
        assert_eq!(publisher.state(), PublisherState::Unstarted);

        let err = publisher.push(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, BridgeError::Sink(SinkError::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_starts_implicitly_with_default_track_name() {
        let sink = Arc::new(LoopbackSink::new());
        let mut publisher = publisher(&sink);

        assert_eq!(publisher.push(&[0; 10]).await.unwrap(), 0);
        assert_eq!(publisher.state(), PublisherState::Started);
        assert_eq!(publisher.track().unwrap().name, DEFAULT_TRACK_NAME);
        assert_eq!(publisher.buffered_samples(), 19);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_drains_complete_frames_only() {
        let sink = Arc::new(LoopbackSink::with_frame_log());
        let mut publisher = publisher(&sink);

        // 480 in -> 959 out: just short of a frame.
        assert_eq!(publisher.push(&[100; 480]).await.unwrap(), 0);
        assert_eq!(publisher.buffered_samples(), 959);

        // +1 in -> +2 out: one frame, one sample left over.
        assert_eq!(publisher.push(&[100; 1]).await.unwrap(), 1);
        assert_eq!(publisher.buffered_samples(), 1);

        // 2000 in -> 4000 out: 4001 buffered -> 4 frames, 161 left.
        assert_eq!(publisher.push(&[100; 2000]).await.unwrap(), 4);
        assert_eq!(publisher.buffered_samples(), 161);

        let frames = sink.frames();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.samples.len() == 960));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_never_early() {
        let sink = Arc::new(LoopbackSink::with_frame_log());
        let mut publisher = publisher(&sink);

        for _ in 0..10 {
            publisher.push(&[500; 1000]).await.unwrap();
        }
        publisher.flush().await.unwrap();

        let frames = sink.frames();
        assert!(frames.len() >= 20);
        let anchor = frames[0].captured_at;
        for (i, frame) in frames.iter().enumerate() {
            let slot = Duration::from_millis(20 * i as u64);
            assert!(
                frame.captured_at.duration_since(anchor) >= slot,
                "frame {i} captured before its slot"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_pipeline_catches_up_without_sleeping() {
        let sink = Arc::new(LoopbackSink::with_frame_log());
        let mut publisher = publisher(&sink);

        publisher.push(&[1; 480]).await.unwrap();
        publisher.push(&[1; 1]).await.unwrap(); // frame 0 anchors the clock
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ten frames' worth arriving late go out back to back.
        let before = Instant::now();
        publisher.push(&[1; 4800]).await.unwrap();
        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(sink.frames().len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_fades_pads_and_empties_fifo() {
        let sink = Arc::new(LoopbackSink::with_frame_log());
        let mut publisher = publisher(&sink);

        publisher.push(&[1000; 24]).await.unwrap();
        assert_eq!(publisher.buffered_samples(), 47);
        assert!(sink.frames().is_empty());

        publisher.flush().await.unwrap();
        assert_eq!(publisher.buffered_samples(), 0);
        assert_eq!(publisher.state(), PublisherState::Started);

        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0].samples;
        assert_eq!(frame.len(), 960);
        assert_eq!(frame[0], 1000);
        assert_eq!(frame[46], 1000 / 47);
        assert!(frame.windows(2).take(47).all(|w| w[1] <= w[0]));
        assert!(frame[47..].iter().all(|&s| s == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_playout() {
        let sink = Arc::new(LoopbackSink::new());
        let mut publisher = publisher(&sink);

        let started = Instant::now();
        publisher.push(&[7; 4800]).await.unwrap(); // 10 frames = 200 ms
        publisher.flush().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_empty_publisher_is_noop() {
        let sink = Arc::new(LoopbackSink::new());
        let mut publisher = publisher(&sink);
        publisher.flush().await.unwrap();
        assert_eq!(publisher.state(), PublisherState::Unstarted);
        assert_eq!(sink.stats().frames_captured, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_keeps_carry_and_clock_within_session() {
        let sink = Arc::new(LoopbackSink::with_frame_log());
        let mut publisher = publisher(&sink);

        publisher.push(&[1; 24]).await.unwrap();
        publisher.flush().await.unwrap();
        assert_eq!(publisher.buffered_samples(), 0);

        // Only the first chunk of a session loses a sample.
        publisher.push(&[1; 24]).await.unwrap();
        assert_eq!(publisher.buffered_samples(), 48);

        // The clock keeps its anchor: after an idle second the next frames
        // are already overdue and go out back to back.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let before = Instant::now();
        publisher.push(&[1; 960]).await.unwrap(); // 48 + 1920 -> 2 frames
        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(sink.frames().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resets_carry_and_clock() {
        let sink = Arc::new(LoopbackSink::with_frame_log());
        let mut publisher = publisher(&sink);

        publisher.push(&[1; 24]).await.unwrap();
        publisher.stop().await.unwrap();

        // A new session starts over with the first-chunk length.
        publisher.push(&[1; 24]).await.unwrap();
        assert_eq!(publisher.buffered_samples(), 47);

        tokio::time::sleep(Duration::from_secs(1)).await;
        publisher.push(&[1; 1000]).await.unwrap(); // 47 + 2000 -> 2 frames
        publisher.flush().await.unwrap();
        let frames = sink.frames();
        let second = &frames[1..];
        assert_eq!(second.len(), 3);
        let anchor = second[0].captured_at;
        for (i, frame) in second.iter().enumerate() {
            assert!(frame.captured_at.duration_since(anchor) >= Duration::from_millis(20 * i as u64));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flushes_and_releases() {
        let sink = Arc::new(LoopbackSink::with_frame_log());
        let mut publisher = publisher(&sink);

        publisher.push(&[50; 100]).await.unwrap();
        publisher.stop().await.unwrap();

        assert_eq!(publisher.state(), PublisherState::Stopped);
        assert!(publisher.track().is_none());
        assert_eq!(publisher.buffered_samples(), 0);
        assert_eq!(sink.frames().len(), 1);
        let stats = sink.stats();
        assert_eq!(stats.tracks_published, 1);
        assert_eq!(stats.tracks_released, 1);

        // A later push publishes a new track.
        publisher.push(&[50; 10]).await.unwrap();
        assert_eq!(publisher.state(), PublisherState::Started);
        assert_eq!(sink.stats().tracks_published, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_swallows_release_failure() {
        let sink = Arc::new(LoopbackSink::new());
        let mut publisher = publisher(&sink);
        publisher.start("bridge").await.unwrap();

        // Release it behind the publisher's back so its own release fails.
        let track = publisher.track().unwrap().clone();
        sink.release(track).await.unwrap();

        publisher.stop().await.ok();
        assert_eq!(publisher.state(), PublisherState::Stopped);
        assert!(publisher.track().is_none());
    }
}
