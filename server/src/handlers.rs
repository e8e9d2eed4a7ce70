use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use bridge_core::{speak_bridge, BridgeError, BridgeReport, PublisherState};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ApiError;
use crate::metrics::MetricsResponse;
use crate::validation::validate_participant_name;
use crate::AppState;

/// Name used by the demo route when the caller gives none.
const DEMO_PARTICIPANT: &str = "you";

#[derive(Debug, Default, Deserialize)]
pub struct DemoBridgeRequest {
    pub participant_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DemoBridgeResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub report: BridgeReport,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParticipantDisconnected {
    pub identity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub participant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub ok: bool,
    pub state: PublisherState,
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// Speak one bridge line and answer once it has played out.
pub async fn demo_bridge(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DemoBridgeResponse>, ApiError> {
    let req: DemoBridgeRequest = parse_optional_json(&body)?;
    let name = match req.participant_name.as_deref() {
        Some(name) => validate_participant_name(name)?,
        None => DEMO_PARTICIPANT,
    };

    // Detached so a request timeout cannot cancel the bridge before its flush.
    let name = name.to_string();
    let report = tokio::spawn(async move { run_bridge(&state, Some(&name)).await })
        .await
        .map_err(|e| ApiError::InternalError(format!("bridge task failed: {e}")))??;
    Ok(Json(DemoBridgeResponse { ok: true, report }))
}

/// Room event hook: start a bridge in the background and return at once.
pub async fn participant_disconnected(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let event: ParticipantDisconnected = parse_optional_json(&body)?;
    let identity = event
        .identity
        .as_deref()
        .map(validate_participant_name)
        .transpose()?
        .map(str::to_string);

    info!(participant = identity.as_deref().unwrap_or("<unknown>"), "Participant disconnected");

    let task_state = state.clone();
    let task_identity = identity.clone();
    tokio::spawn(async move {
        if let Err(e) = run_bridge(&task_state, task_identity.as_deref()).await {
            error!("Bridge failed: {e}");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            participant: identity,
        }),
    ))
}

pub async fn stop(State(state): State<AppState>) -> Result<Json<StopResponse>, ApiError> {
    let mut publisher = state.publisher.lock().await;
    publisher.stop().await?;
    Ok(Json(StopResponse {
        ok: true,
        state: publisher.state(),
    }))
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    // A bridge in progress holds the lock; report what is known without waiting.
    let (publisher_state, track) = match state.publisher.try_lock() {
        Ok(publisher) => (
            Some(publisher.state()),
            publisher.track().map(|t| t.name.clone()),
        ),
        Err(_) => (None, None),
    };

    Json(MetricsResponse {
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        bridge_in_progress: publisher_state.is_none(),
        publisher_state,
        track,
        bridges: state.metrics.snapshot(),
    })
}

/// Run one bridge against the shared publisher and record the outcome.
pub async fn run_bridge(
    state: &AppState,
    participant: Option<&str>,
) -> Result<BridgeReport, BridgeError> {
    let mut publisher = state.publisher.lock().await;
    match speak_bridge(&mut publisher, state.speech.as_ref(), participant).await {
        Ok(report) => {
            state.metrics.record_bridge(&report);
            Ok(report)
        }
        Err(e) => {
            state.metrics.record_error();
            Err(e)
        }
    }
}

/// An empty body means "all defaults".
fn parse_optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid JSON body: {e}")))
}
