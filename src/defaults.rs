//! Default configuration constants for voxgate.
//!
//! Shared by the config sections and the components that fall back to them
//! when constructed without a config.

/// Canonical PCM sample rate in Hz fed to every transcription engine.
pub const SAMPLE_RATE: u32 = 16000;

/// Address the HTTP server binds to.
pub const HOST: &str = "0.0.0.0";

/// Port the HTTP server listens on.
pub const PORT: u16 = 8008;

/// Upper bound on HTTP requests processed at the same time.
pub const MAX_CONCURRENT_REQUESTS: usize = 100;

/// Largest HTTP request body accepted; base64 audio inflates by a third.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Language used when a request names none.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Inputs shorter than this many bytes are reported as too short
/// instead of being sent to the transcoder.
pub const MIN_INPUT_BYTES: usize = 50;

/// Time a fresh streaming connection has to send its JSON config.
pub const CONFIG_TIMEOUT_MS: u64 = 5000;

/// Largest chunk (bytes) a streaming session processes; longer frames are truncated.
pub const CHUNK_SIZE_LIMIT: u32 = 50_000;

/// Streaming chunks smaller than this get `need_more_audio` and no inference.
pub const MIN_CHUNK_BYTES: usize = 4000;

/// Directories whose data exceeds this size are never wiped by repair.
///
/// Protects large partial weight downloads from being thrown away because a
/// small metadata file is broken.
pub const WIPE_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Attempts made to acquire an artifact before giving up.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff between artifact acquisition attempts; doubles each retry.
pub const RETRY_BACKOFF_MS: u64 = 500;

/// Marker written inside a variant directory once every file verified.
pub const COMPLETE_MARKER: &str = ".download_complete";

/// Suffix of files whose download has not finished yet.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Segments whose no-speech probability exceeds this are dropped.
pub const NO_SPEECH_THRESHOLD: f32 = 0.6;

/// Slowest and fastest synthesis speed factors accepted.
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Words per minute the system synthesizer uses at speed 1.0.
pub const SYSTEM_SYNTH_WPM: u32 = 175;

/// Voice used when a synthesis request names none.
pub const DEFAULT_VOICE: &str = "neutral";

/// Longest text the hosted synthesis endpoint accepts per request.
pub const CLOUD_SYNTH_MAX_CHARS: usize = 200;

/// Tokens in raw engine output that mark a word boundary.
pub const CONTROL_TOKENS: &[&str] = &["</s>", "<s>", "|"];

/// Tokens deleted from raw engine output; they can sit inside a word.
pub const DELETED_TOKENS: &[&str] = &["<pad>", "<unk>"];

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_backend_returns_known_value() {
        let backend = gpu_backend();
        assert!(
            ["CUDA", "Vulkan", "CPU"].contains(&backend),
            "unexpected backend: {}",
            backend
        );
    }

    #[test]
    fn test_speed_bounds_are_ordered() {
        assert!(MIN_SPEED < 1.0 && 1.0 < MAX_SPEED);
    }

    #[test]
    fn test_min_chunk_below_chunk_limit() {
        assert!((MIN_CHUNK_BYTES as u32) < CHUNK_SIZE_LIMIT);
    }
}
