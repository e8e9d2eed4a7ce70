//! Agent service: plays a bridge line into the room while a participant
//! reconnects.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use bridge_core::{BridgeError, LivePublisher, MediaSink};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use tts_core::SpeechSource;

use crate::config::ServerConfig;
use crate::metrics::BridgeMetrics;

#[derive(Clone)]
pub struct AppState {
    /// One publisher per agent; bridges queue up behind the lock.
    pub publisher: Arc<Mutex<LivePublisher>>,
    pub speech: Arc<dyn SpeechSource>,
    pub metrics: BridgeMetrics,
    pub config: ServerConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        sink: Arc<dyn MediaSink>,
        speech: Arc<dyn SpeechSource>,
    ) -> Result<Self, BridgeError> {
        let publisher = LivePublisher::new(sink, config.publisher_config())?;
        Ok(Self {
            publisher: Arc::new(Mutex::new(publisher)),
            speech,
            metrics: BridgeMetrics::new(),
            config,
            started_at: Instant::now(),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config))
        .into_inner();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .route("/demo/bridge", post(handlers::demo_bridge))
        .route(
            "/events/participant-disconnected",
            post(handlers::participant_disconnected),
        )
        .route("/stop", post(handlers::stop))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        base.allow_origin(tower_http::cors::Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(tower_http::cors::AllowOrigin::list(origins))
    }
}

/// Tag every request and response with an `x-request-id`, keeping one the
/// caller already sent.
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .cloned()
        .or_else(|| HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok());

    if let Some(id) = &request_id {
        request.headers_mut().insert("x-request-id", id.clone());
    }
    let mut response = next.run(request).await;
    if let Some(id) = request_id {
        response.headers_mut().insert("x-request-id", id);
    }
    response
}
