// Bridge metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bridge_core::{BridgeReport, PublisherState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latency samples kept for percentile calculation
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Counters for bridged utterances. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct BridgeMetrics {
    pub bridge_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub chunks_forwarded: Arc<AtomicU64>,
    pub input_samples: Arc<AtomicU64>,
    pub frames_emitted: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
    pub latency_samples: Arc<Mutex<Vec<u64>>>,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self {
            bridge_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            chunks_forwarded: Arc::new(AtomicU64::new(0)),
            input_samples: Arc::new(AtomicU64::new(0)),
            frames_emitted: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record_bridge(&self, report: &BridgeReport) {
        self.bridge_count.fetch_add(1, Ordering::Relaxed);
        self.chunks_forwarded
            .fetch_add(report.chunks as u64, Ordering::Relaxed);
        self.input_samples
            .fetch_add(report.input_samples as u64, Ordering::Relaxed);
        self.frames_emitted.fetch_add(report.frames, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(report.elapsed_ms, Ordering::Relaxed);
        self.max_latency_ms
            .fetch_max(report.elapsed_ms, Ordering::Relaxed);

        let mut samples = self
            .latency_samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        samples.push(report.elapsed_ms);
        if samples.len() > MAX_LATENCY_SAMPLES {
            samples.remove(0);
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.bridge_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        let samples = self
            .latency_samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if samples.is_empty() {
            return 0;
        }
        let mut sorted = samples.clone();
        sorted.sort_unstable();
        let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            bridge_count: self.bridge_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            chunks_forwarded: self.chunks_forwarded.load(Ordering::Relaxed),
            input_samples: self.input_samples.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct BridgeStats {
    pub bridge_count: u64,
    pub error_count: u64,
    pub chunks_forwarded: u64,
    pub input_samples: u64,
    pub frames_emitted: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub bridge_in_progress: bool,
    pub publisher_state: Option<PublisherState>,
    pub track: Option<String>,
    pub bridges: BridgeStats,
}
