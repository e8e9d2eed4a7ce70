//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use bridge_core::LoopbackSink;
use server::{build_router, config::ServerConfig, AppState};
use tower::ServiceExt;
use tts_core::{PcmStream, SpeechSource, TtsError};

/// How the scripted speech source behaves on every `open`.
#[derive(Clone)]
pub enum Script {
    /// Yield these chunks, then end normally.
    Chunks(Vec<Vec<i16>>),
    /// Fail before producing a stream.
    OpenError(fn() -> TtsError),
    /// Yield the chunks, then fail.
    FailAfter(Vec<Vec<i16>>, fn() -> TtsError),
    /// Yield the chunks with a pause before each one after the first.
    Paced(Vec<Vec<i16>>, Duration),
}

pub struct ScriptedSpeech {
    script: Script,
    pub opened: AtomicUsize,
}

impl ScriptedSpeech {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            opened: AtomicUsize::new(0),
        }
    }

    /// A few chunks of quiet tone; plays for roughly 100 ms.
    pub fn short_line() -> Self {
        Self::new(Script::Chunks(vec![vec![200; 480], vec![-200; 480], vec![100; 240]]))
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSource for ScriptedSpeech {
    async fn open(&self, _text: &str) -> Result<PcmStream, TtsError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (chunks, failure, pause) = match self.script.clone() {
            Script::OpenError(err) => return Err(err()),
            Script::Chunks(chunks) => (chunks, None, None),
            Script::FailAfter(chunks, err) => (chunks, Some(err), None),
            Script::Paced(chunks, pause) => (chunks, None, Some(pause)),
        };
        Ok(Box::pin(stream! {
            for (i, chunk) in chunks.into_iter().enumerate() {
                if let (Some(pause), true) = (pause, i > 0) {
                    tokio::time::sleep(pause).await;
                }
                yield Ok(chunk);
            }
            if let Some(err) = failure {
                yield Err(err());
            }
        }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sink: Arc<LoopbackSink>,
    pub speech: Arc<ScriptedSpeech>,
}

/// Create a test app instance backed by a loopback sink
pub fn create_test_app(speech: ScriptedSpeech) -> TestApp {
    create_test_app_with_config(speech, ServerConfig::default())
}

pub fn create_test_app_with_config(speech: ScriptedSpeech, config: ServerConfig) -> TestApp {
    let sink = Arc::new(LoopbackSink::with_frame_log());
    let speech = Arc::new(speech);
    let state = AppState::new(config, sink.clone(), speech.clone())
        .expect("default publisher config is valid");
    TestApp {
        router: build_router(state.clone()),
        state,
        sink,
        speech,
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}
