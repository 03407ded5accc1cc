//! Error types for voxgate.

use crate::config::Messages;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxgateError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio pipeline errors
    #[error("Audio input too short: {bytes} bytes (minimum {minimum})")]
    InputTooShort { bytes: usize, minimum: usize },

    #[error("Unsupported or corrupt audio: {message}")]
    CorruptAudio { message: String },

    #[error("Audio conversion failed: {message}")]
    ConversionFailed { message: String },

    // Artifact errors
    #[error("Artifact '{variant}' unavailable: {message}")]
    ArtifactUnavailable { variant: String, message: String },

    #[error("Unknown artifact variant: {variant}")]
    UnknownArtifact { variant: String },

    #[error("Download failed: {message}")]
    Download { message: String },

    // Engine errors
    #[error("Failed to load engine {key}: {message}")]
    EngineLoadFailed { key: String, message: String },

    #[error("No engine available for language '{language}' ({attempts} candidates tried)")]
    NoEngineAvailable { language: String, attempts: usize },

    #[error("Inference failed in {engine}: {message}")]
    InferenceFailed { engine: String, message: String },

    #[error("Transcript rejected as noise: {text}")]
    NoiseRejected { text: String },

    // Request validation
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Streaming transport
    #[error("Stream transport error: {message}")]
    Transport { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl VoxgateError {
    /// Stable machine-readable code for API responses and stream frames.
    pub fn code(&self) -> &'static str {
        match self {
            VoxgateError::ConfigFileNotFound { .. }
            | VoxgateError::ConfigInvalidValue { .. }
            | VoxgateError::Config(_) => "config_error",
            VoxgateError::InputTooShort { .. } => "input_too_short",
            VoxgateError::CorruptAudio { .. } => "unsupported_or_corrupt_audio",
            VoxgateError::ConversionFailed { .. } => "conversion_failed",
            VoxgateError::ArtifactUnavailable { .. }
            | VoxgateError::UnknownArtifact { .. }
            | VoxgateError::Download { .. } => "artifact_unavailable",
            VoxgateError::EngineLoadFailed { .. } => "engine_load_failed",
            VoxgateError::NoEngineAvailable { .. } => "no_engine_available",
            VoxgateError::InferenceFailed { .. } => "inference_failed",
            VoxgateError::NoiseRejected { .. } => "noise_rejected",
            VoxgateError::InvalidRequest { .. } => "invalid_request",
            VoxgateError::Transport { .. } => "transport_error",
            VoxgateError::Io(_) | VoxgateError::Other(_) => "internal_error",
        }
    }

    /// Whether a later attempt with the same inputs may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VoxgateError::EngineLoadFailed { .. }
                | VoxgateError::Download { .. }
                | VoxgateError::ArtifactUnavailable { .. }
                | VoxgateError::Io(_)
        )
    }

    /// User-facing text in the caller's language.
    pub fn user_message<'a>(&self, messages: &'a Messages) -> &'a str {
        match self {
            VoxgateError::InputTooShort { .. } => &messages.too_short,
            VoxgateError::CorruptAudio { .. } => &messages.corrupt_audio,
            VoxgateError::ConversionFailed { .. } => &messages.conversion_failed,
            VoxgateError::NoiseRejected { .. } => &messages.could_not_understand,
            VoxgateError::ArtifactUnavailable { .. }
            | VoxgateError::UnknownArtifact { .. }
            | VoxgateError::Download { .. }
            | VoxgateError::EngineLoadFailed { .. }
            | VoxgateError::NoEngineAvailable { .. } => &messages.engine_unavailable,
            _ => &messages.transcription_failed,
        }
    }
}

pub type Result<T> = std::result::Result<T, VoxgateError>;
