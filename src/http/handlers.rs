use super::state::AppState;
use crate::audio::{CaptureConfig, CaptureSource, PlaybackConfig};
use crate::session::{LiveSession, SessionConfig, SessionStats, TranscriptTurn};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Voice for model speech (default from config)
    pub voice: Option<String>,

    /// Persona instruction override
    pub system_instruction: Option<String>,

    /// Stream a WAV file instead of the microphone (testing/batch)
    pub capture_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Start a new live conversation session
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("live-{}", uuid::Uuid::new_v4()));

    info!("Starting live session: {}", session_id);

    // Reject a second start while the session is connecting or connected
    {
        let sessions = state.sessions.read().await;
        if let Some(existing) = sessions.get(&session_id) {
            if !existing.state().await.can_start() {
                return (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse {
                        error: format!("Session {} is already active", session_id),
                    }),
                )
                    .into_response();
            }
        }
    }

    let defaults = &state.defaults;
    let config = SessionConfig {
        session_id: session_id.clone(),
        endpoint: defaults.endpoint.clone(),
        api_key: defaults.api_key.clone(),
        model: defaults.model.clone(),
        voice: req.voice.unwrap_or_else(|| defaults.voice.clone()),
        system_instruction: req
            .system_instruction
            .unwrap_or_else(|| defaults.system_instruction.clone()),
        capture_source: match req.capture_file {
            Some(path) => CaptureSource::File(path),
            None => CaptureSource::Microphone,
        },
        capture: CaptureConfig {
            sample_rate: defaults.capture_sample_rate,
            channels: 1,
            block_size: defaults.block_size,
        },
        playback_sample_rate: defaults.playback_sample_rate,
        playback: PlaybackConfig::default(),
    };

    let session = Arc::new(LiveSession::new(config));

    if let Err(e) = session.start().await {
        error!("Failed to start session: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to start session: {}", e),
            }),
        )
            .into_response();
    }

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), session);
    }

    info!("Live session started: {}", session_id);

    (
        StatusCode::OK,
        Json(StartSessionResponse {
            session_id: session_id.clone(),
            status: "connecting".to_string(),
            message: format!("Live session {} started", session_id),
        }),
    )
        .into_response()
}

/// POST /sessions/:session_id/stop
/// Stop a live session
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping live session: {}", session_id);

    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match session {
        Some(session) => {
            let stats = session.stop().await;
            (
                StatusCode::OK,
                Json(StopSessionResponse {
                    session_id: session_id.clone(),
                    status: "stopped".to_string(),
                    message: "Live session stopped".to_string(),
                    stats,
                }),
            )
                .into_response()
        }
        None => {
            error!("Session {} not found", session_id);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Session {} not found", session_id),
                }),
            )
                .into_response()
        }
    }
}

/// GET /sessions/:session_id/status
/// Get state and statistics of a live session
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(session) => {
            let stats = session.get_stats().await;
            (StatusCode::OK, Json(stats)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /sessions/:session_id/transcript
/// Get finalized conversation turns (accumulated so far)
pub async fn get_session_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(session) => {
            let transcript: Vec<TranscriptTurn> = session.get_transcript().await;
            (StatusCode::OK, Json(transcript)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
