//! Streaming synthesis over the realtime websocket API.
//!
//! [`RealtimeTts::stream_speech`] opens a session, asks the model to speak a
//! line of text and hands back a lazy stream of 24 kHz PCM16 chunks. A reader
//! task owns the socket and forwards decoded chunks through a bounded channel;
//! the returned stream is the only consumer. Dropping the stream stops the
//! reader, which closes the socket.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::RealtimeTtsConfig;
use crate::error::TtsError;
use crate::pcm::decode_pcm16_base64;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::{PcmStream, SpeechSource};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a synthesis session stopped producing audio.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionEnd {
    AudioDone,
    ResponseDone,
    ServerError(String),
    Closed,
    Transport(String),
}

#[derive(Debug)]
enum SessionEvent {
    Audio(Vec<i16>),
    Ended(SessionEnd),
}

/// Realtime speech synthesis client. Cheap to share; every call to
/// [`stream_speech`](Self::stream_speech) opens its own connection.
#[derive(Debug, Clone)]
pub struct RealtimeTts {
    config: RealtimeTtsConfig,
}

impl RealtimeTts {
    pub fn new(config: RealtimeTtsConfig) -> Result<Self, TtsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RealtimeTtsConfig {
        &self.config
    }

    /// Open a session for `text` and return its PCM chunk stream.
    ///
    /// Fails with [`TtsError::Connect`] when the handshake does not complete
    /// within the connect timeout. Liveness failures (`NoAudioTimeout`,
    /// `NoAudio`) are reported through the stream itself.
    pub async fn stream_speech(&self, text: &str) -> Result<PcmStream, TtsError> {
        let mut socket = self.connect().await?;

        let session = ClientEvent::session_update(&self.config.voice, &self.config.instructions);
        socket
            .send(Message::Text(session.to_json()))
            .await
            .map_err(|e| TtsError::Connect(format!("failed to send session.update: {e}")))?;
        socket
            .send(Message::Text(ClientEvent::speak(text).to_json()))
            .await
            .map_err(|e| TtsError::Connect(format!("failed to send response.create: {e}")))?;

        info!(
            voice = %self.config.voice,
            text_len = text.len(),
            "Realtime TTS session started"
        );

        let deadline = Instant::now() + self.config.no_audio_timeout;
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(read_session(socket, tx, shutdown_rx));

        Ok(consume(rx, shutdown_tx, deadline, self.config.no_audio_timeout))
    }

    async fn connect(&self) -> Result<Socket, TtsError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TtsError::Connect(format!("invalid url {}: {e}", self.config.url)))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| TtsError::Config("API key contains invalid header characters".into()))?;
        let headers = request.headers_mut();
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request)).await {
            Ok(Ok((socket, _response))) => Ok(socket),
            Ok(Err(e)) => Err(TtsError::Connect(e.to_string())),
            Err(_) => Err(TtsError::Connect(format!(
                "handshake timed out after {}s",
                timeout.as_secs_f32()
            ))),
        }
    }
}

#[async_trait]
impl SpeechSource for RealtimeTts {
    async fn open(&self, text: &str) -> Result<PcmStream, TtsError> {
        self.stream_speech(text).await
    }
}

/// Socket reader: classifies inbound messages and feeds the chunk channel
/// until the session ends or the consumer goes away.
async fn read_session(
    mut socket: Socket,
    tx: mpsc::Sender<SessionEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut chunks = 0usize;
    let mut dropped = 0usize;

    let end = loop {
        let frame = tokio::select! {
            _ = &mut shutdown => break None,
            frame = socket.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break Some(SessionEnd::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => break Some(SessionEnd::Transport(e.to_string())),
        };

        let Some(event) = ServerEvent::parse(&text) else {
            continue;
        };

        match event {
            ServerEvent::AudioDelta { delta } => match decode_pcm16_base64(&delta) {
                Ok(pcm) => {
                    chunks += 1;
                    if tx.send(SessionEvent::Audio(pcm)).await.is_err() {
                        break None;
                    }
                }
                Err(e) => {
                    dropped += 1;
                    warn!(dropped, "Dropping audio delta: {e}");
                }
            },
            ServerEvent::AudioDone { .. } => break Some(SessionEnd::AudioDone),
            ServerEvent::ResponseDone { .. } => break Some(SessionEnd::ResponseDone),
            ServerEvent::Error { error } => {
                let detail = error.map(|e| e.to_string()).unwrap_or_default();
                error!("Realtime TTS error: {detail}");
                break Some(SessionEnd::ServerError(detail));
            }
            ServerEvent::Other => {}
        }
    };

    match &end {
        Some(end) => debug!(chunks, dropped, ?end, "Realtime TTS session ended"),
        None => debug!(chunks, dropped, "Realtime TTS consumer went away"),
    }
    if dropped > 0 {
        warn!(dropped, chunks, "Realtime TTS session dropped malformed audio payloads");
    }

    if let Some(end) = end {
        let _ = tx.send(SessionEvent::Ended(end)).await;
    }
    // Best effort; the peer may already be gone.
    let _ = socket.close(None).await;
}

fn consume(
    mut rx: mpsc::Receiver<SessionEvent>,
    shutdown: oneshot::Sender<()>,
    deadline: Instant,
    no_audio_timeout: Duration,
) -> PcmStream {
    Box::pin(async_stream::stream! {
        // Dropping the stream drops this sender, which stops the reader.
        let _shutdown = shutdown;
        let mut received = 0usize;

        loop {
            let event = if received == 0 {
                match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        warn!("No audio within {}s", no_audio_timeout.as_secs_f32());
                        yield Err(TtsError::NoAudioTimeout(no_audio_timeout));
                        return;
                    }
                }
            } else {
                rx.recv().await
            };

            match event {
                Some(SessionEvent::Audio(pcm)) => {
                    received += 1;
                    yield Ok(pcm);
                }
                Some(SessionEvent::Ended(end)) => {
                    if received == 0 {
                        warn!(?end, "Realtime TTS session ended without audio");
                    } else {
                        debug!(?end, chunks = received, "Realtime TTS stream complete");
                    }
                    break;
                }
                None => break,
            }
        }

        if received == 0 {
            yield Err(TtsError::NoAudio);
        }
    })
}
