//! In-process media sink.
//!
//! Models a transport with a real-time playout queue: each captured frame
//! extends the track's playout horizon by its duration, capture blocks once
//! more than `queue_size_ms` is queued, and `wait_for_playout` sleeps until
//! the horizon. Used by the agent service when no room transport is wired in,
//! and by tests to observe exactly what the publisher emitted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::sink::{MediaSink, SinkError, TrackHandle, TrackOptions};

/// One frame as the sink received it.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub track: Uuid,
    pub captured_at: Instant,
    pub samples: Vec<i16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopbackStats {
    pub tracks_published: u64,
    pub tracks_released: u64,
    pub frames_captured: u64,
    pub samples_captured: u64,
}

#[derive(Debug)]
struct TrackPlayout {
    options: TrackOptions,
    playout_end: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    tracks: HashMap<Uuid, TrackPlayout>,
    frames: Vec<CapturedFrame>,
    stats: LoopbackStats,
}

#[derive(Debug)]
pub struct LoopbackSink {
    connected: AtomicBool,
    retain_frames: bool,
    inner: Mutex<Inner>,
}

impl Default for LoopbackSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackSink {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            retain_frames: false,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Like `new`, but keeps every captured frame for inspection.
    pub fn with_frame_log() -> Self {
        Self {
            retain_frames: true,
            ..Self::new()
        }
    }

    /// Simulate the local participant joining or leaving.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> LoopbackStats {
        self.lock().stats.clone()
    }

    /// Frames retained so far, in capture order. Empty unless built with
    /// `with_frame_log`.
    pub fn frames(&self) -> Vec<CapturedFrame> {
        self.lock().frames.clone()
    }

    pub fn active_tracks(&self) -> usize {
        self.lock().tracks.len()
    }

    /// Audio queued on `track` that has not been played out yet.
    pub fn queued(&self, track: &TrackHandle) -> Duration {
        self.lock()
            .tracks
            .get(&track.id)
            .map(|p| p.playout_end.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn frame_duration(samples: usize, options: &TrackOptions) -> Duration {
    let per_second = u64::from(options.sample_rate.max(1)) * u64::from(options.channels.max(1));
    Duration::from_nanos(samples as u64 * 1_000_000_000 / per_second)
}

#[async_trait]
impl MediaSink for LoopbackSink {
    async fn acquire_track(&self, name: &str, options: TrackOptions) -> Result<TrackHandle, SinkError> {
        if !self.is_connected() {
            return Err(SinkError::Unavailable("local participant not ready".to_string()));
        }

        let track = TrackHandle::new(name, options);
        {
            let mut inner = self.lock();
            inner.tracks.insert(
                track.id,
                TrackPlayout {
                    options,
                    playout_end: Instant::now(),
                },
            );
            inner.stats.tracks_published += 1;
        }
        info!(name, id = %track.id, sample_rate = options.sample_rate, "Loopback track published");
        Ok(track)
    }

    async fn capture(&self, track: &TrackHandle, frame: &[i16]) -> Result<(), SinkError> {
        let backlog_excess = {
            let inner = self.lock();
            let playout = inner
                .tracks
                .get(&track.id)
                .ok_or(SinkError::UnknownTrack(track.id))?;
            let capacity = Duration::from_millis(u64::from(playout.options.queue_size_ms));
            let backlog = playout.playout_end.saturating_duration_since(Instant::now());
            (backlog + frame_duration(frame.len(), &playout.options)).saturating_sub(capacity)
        };
        if !backlog_excess.is_zero() {
            debug!(wait_ms = backlog_excess.as_millis() as u64, "Loopback queue full");
            tokio::time::sleep(backlog_excess).await;
        }

        let mut guard = self.lock();
        let inner = &mut *guard;
        let playout = inner
            .tracks
            .get_mut(&track.id)
            .ok_or(SinkError::UnknownTrack(track.id))?;
        let now = Instant::now();
        playout.playout_end = playout.playout_end.max(now) + frame_duration(frame.len(), &playout.options);

        inner.stats.frames_captured += 1;
        inner.stats.samples_captured += frame.len() as u64;
        if self.retain_frames {
            inner.frames.push(CapturedFrame {
                track: track.id,
                captured_at: now,
                samples: frame.to_vec(),
            });
        }
        Ok(())
    }

    async fn wait_for_playout(&self, track: &TrackHandle) -> Result<(), SinkError> {
        let playout_end = {
            let inner = self.lock();
            inner
                .tracks
                .get(&track.id)
                .map(|p| p.playout_end)
                .ok_or(SinkError::UnknownTrack(track.id))?
        };
        tokio::time::sleep_until(playout_end).await;
        Ok(())
    }

    async fn release(&self, track: TrackHandle) -> Result<(), SinkError> {
        let mut inner = self.lock();
        inner
            .tracks
            .remove(&track.id)
            .ok_or(SinkError::UnknownTrack(track.id))?;
        inner.stats.tracks_released += 1;
        drop(inner);
        info!(id = %track.id, "Loopback track released");
        Ok(())
    }
}
