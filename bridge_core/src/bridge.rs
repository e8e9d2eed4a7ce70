//! Speak a short "please hold" line while a participant reconnects.

use futures_util::StreamExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};
use tts_core::SpeechSource;

use crate::error::Result;
use crate::publisher::LivePublisher;

/// Outcome of one bridged utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeReport {
    pub text: String,
    /// Chunks received from the speech source.
    pub chunks: usize,
    /// 24 kHz samples pushed into the publisher.
    pub input_samples: usize,
    /// 48 kHz frames captured by the sink for this utterance.
    pub frames: u64,
    pub elapsed_ms: u64,
}

pub fn bridge_line(participant: Option<&str>) -> String {
    match participant.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!(
            "We hit a brief connection issue with {name}. One moment while we reconnect."
        ),
        None => "We hit a brief connection issue. One moment while we reconnect.".to_string(),
    }
}

/// Synthesise the bridge line and play it through `publisher`.
///
/// The publisher is flushed exactly once, whether the source finished,
/// failed to open or failed mid-stream. The first error wins.
pub async fn speak_bridge(
    publisher: &mut LivePublisher,
    source: &dyn SpeechSource,
    participant: Option<&str>,
) -> Result<BridgeReport> {
    let text = bridge_line(participant);
    info!("Playing bridge message: {text}");

    let started = Instant::now();
    let frames_before = publisher.frames_emitted();

    let forwarded = forward(publisher, source, &text).await;
    let flushed = publisher.flush().await;

    let (chunks, input_samples) = match (forwarded, flushed) {
        (Ok(counts), Ok(())) => counts,
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), flushed) => {
            if let Err(flush_err) = flushed {
                warn!("Flush after failed bridge also failed: {flush_err}");
            }
            return Err(e);
        }
    };

    let report = BridgeReport {
        text,
        chunks,
        input_samples,
        frames: publisher.frames_emitted() - frames_before,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        chunks = report.chunks,
        frames = report.frames,
        elapsed_ms = report.elapsed_ms,
        "Bridge message done"
    );
    Ok(report)
}

async fn forward(
    publisher: &mut LivePublisher,
    source: &dyn SpeechSource,
    text: &str,
) -> Result<(usize, usize)> {
    let mut stream = source.open(text).await?;
    let mut chunks = 0;
    let mut samples = 0;

    while let Some(chunk) = stream.next().await {
        let pcm = chunk?;
        publisher.push(&pcm).await?;
        chunks += 1;
        samples += pcm.len();
    }
    Ok((chunks, samples))
}
