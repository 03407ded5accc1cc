//! HTTP handlers.

use crate::audio::SourceHint;
use crate::engine::PriorityHint;
use crate::interactions::{Interaction, NewInteraction, NewSession, Session};
use crate::server::AppState;
use crate::server::error::ApiError;
use crate::server::ws::serve_socket;
use crate::service::{HealthReport, LanguageSupport, StreamingStatus, TranscriptOutcome, VoiceInfo};
use crate::stt::TranscriptSegment;
use axum::{
    Json,
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Speech-to-text request
#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    /// Base64-encoded audio in any container the transcoder reads.
    pub audio: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Format name or MIME type of `audio`.
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TranscribeResponse {
    pub transcript: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<TranscriptSegment>>,
    /// Set when no transcript was produced; `transcript` then holds a
    /// message for the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SynthesizeResponse {
    /// Base64-encoded audio.
    pub audio: String,
    pub format: String,
    pub source: String,
    pub language: String,
    pub voice: String,
}

pub async fn transcribe(
    State(state): State<AppState>,
    Json(req): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let _permit = state.acquire_permit().await?;

    let audio = base64::engine::general_purpose::STANDARD
        .decode(req.audio.trim())
        .map_err(|e| ApiError::bad_request(format!("audio is not valid base64: {e}")))?;
    let priority: PriorityHint = match req.priority.as_deref() {
        Some(p) => p.parse()?,
        None => PriorityHint::default(),
    };
    let hint: SourceHint = match req.format.as_deref() {
        Some(f) => f.parse().unwrap_or_default(),
        None => SourceHint::default(),
    };
    let language = crate::language::canonicalize(
        req.language
            .as_deref()
            .unwrap_or(&state.service.config().default_language),
    );

    let outcome = state
        .service
        .transcribe(&audio, hint, &language, priority)
        .await
        .map_err(|e| ApiError::for_transcription(e, &state.service.config().messages(&language)))?;

    let response = match outcome {
        TranscriptOutcome::Transcript {
            text,
            segments,
            engine,
        } => TranscribeResponse {
            transcript: text,
            language,
            engine: Some(engine),
            segments: Some(segments),
            error: None,
        },
        TranscriptOutcome::NoSpeech { message } => no_transcript(message, language, "no_speech"),
        TranscriptOutcome::NoiseRejected { message } => no_transcript(message, language, "noise_rejected"),
        TranscriptOutcome::TooShort { message } => no_transcript(message, language, "input_too_short"),
    };
    Ok(Json(response))
}

fn no_transcript(message: String, language: String, code: &str) -> TranscribeResponse {
    TranscribeResponse {
        transcript: message,
        language,
        engine: None,
        segments: None,
        error: Some(code.to_string()),
    }
}

pub async fn synthesize(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let _permit = state.acquire_permit().await?;

    let language = crate::language::canonicalize(
        req.language
            .as_deref()
            .unwrap_or(&state.service.config().default_language),
    );
    let synthesis = state
        .service
        .synthesize(&req.text, &language, req.voice.as_deref(), req.speed)
        .await
        .map_err(|e| ApiError::for_synthesis(e, &state.service.config().messages(&language)))?;

    Ok(Json(SynthesizeResponse {
        audio: base64::engine::general_purpose::STANDARD.encode(&synthesis.audio),
        format: synthesis.format.as_str().to_string(),
        source: synthesis.source,
        language: synthesis.language,
        voice: synthesis.voice,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health().await)
}

pub async fn supported_languages(State(state): State<AppState>) -> Json<Vec<LanguageSupport>> {
    Json(state.service.supported_languages())
}

pub async fn supported_voices(State(state): State<AppState>) -> Json<Vec<VoiceInfo>> {
    Json(state.service.supported_voices())
}

pub async fn websocket_status(State(state): State<AppState>) -> Json<StreamingStatus> {
    Json(state.service.streaming_status())
}

pub async fn stream(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| serve_socket(socket, state.service, None))
}

pub async fn stream_language(
    State(state): State<AppState>,
    Path(language): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| serve_socket(socket, state.service, Some(language)))
}

pub async fn create_session(State(state): State<AppState>, Json(req): Json<NewSession>) -> Json<Session> {
    Json(state.interactions.create_session(req).await)
}

pub async fn list_sessions(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<Vec<Session>> {
    Json(state.interactions.sessions_for_user(&user_id).await)
}

pub async fn save_interaction(
    State(state): State<AppState>,
    Json(req): Json<NewInteraction>,
) -> Json<Interaction> {
    Json(state.interactions.save_interaction(req).await)
}

pub async fn list_interactions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Vec<Interaction>> {
    Json(state.interactions.interactions_for_session(&session_id).await)
}
