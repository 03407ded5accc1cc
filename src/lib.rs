//! voxgate - Speech-to-text and text-to-speech gateway
//!
//! Many concurrent callers share a small set of expensive engines through a
//! lazily populated model cache, with per-language fallback chains, verified
//! on-disk artifacts and a streaming transcription protocol.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod interactions;
pub mod language;
pub mod models;
pub mod normalizer;
pub mod server;
pub mod stt;
pub mod streaming;
pub mod sync;
pub mod tts;

// Composition root - needs everything
pub mod service;

// Core traits (engines, transcoding, artifact fetching, streaming transport)
pub use audio::transcoder::Transcoder;
pub use engine::loader::EngineLoader;
pub use models::download::ArtifactFetcher;
pub use streaming::session::SessionTransport;
pub use stt::transcriber::SpeechToText;
pub use tts::synthesizer::TextToSpeech;

// Components
pub use audio::pipeline::{AudioPipeline, NormalizedAudio, SourceHint};
pub use engine::{EngineBackend, EngineHandle, EngineKey, EngineSelector, ModelCache, PriorityHint};
pub use models::store::{ArtifactState, ArtifactStatus, ArtifactStore};
pub use normalizer::{CleanedTranscript, TranscriptNormalizer};
pub use service::{SpeechService, TranscriptOutcome};
pub use streaming::session::StreamingSession;

// Error handling
pub use error::{Result, VoxgateError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(ver.contains('+'), "With GIT_HASH set, version should contain '+', got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
