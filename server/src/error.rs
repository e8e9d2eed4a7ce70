use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bridge_core::{BridgeError, SinkError};
use serde::Serialize;
use thiserror::Error;
use tts_core::TtsError;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Bridge(BridgeError::Tts(TtsError::Connect(_))) => StatusCode::BAD_GATEWAY,
            ApiError::Bridge(BridgeError::Tts(TtsError::NoAudioTimeout(_))) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Bridge(BridgeError::Tts(TtsError::NoAudio)) => StatusCode::BAD_GATEWAY,
            ApiError::Bridge(BridgeError::Sink(SinkError::Unavailable(_))) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Bridge(_) | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            ApiError::InvalidInput(msg) => msg.clone(),
            ApiError::Bridge(e) => {
                tracing::error!("Bridge error: {}", e);
                e.to_string()
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg.clone()
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
