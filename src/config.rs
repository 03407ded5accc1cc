use crate::defaults;
use crate::engine::EngineBackend;
use crate::error::VoxgateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use crate::language::{LanguageProfile, Messages, VariantPair};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_language: String,
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub audio: AudioConfig,
    pub streaming: StreamingConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub normalizer: NormalizerConfig,
    /// Per-language overrides of the built-in profiles.
    pub languages: BTreeMap<String, LanguageProfile>,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_concurrent_requests: usize,
}

/// On-disk model artifacts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    /// Root directory; defaults to `~/.cache/voxgate/models`.
    pub dir: Option<PathBuf>,
    /// Fetch missing artifacts on demand.
    pub auto_download: bool,
    pub wipe_threshold_bytes: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Pinned hex SHA-256 per `"<variant>/<file>"`, checked on every verify.
    pub checksums: BTreeMap<String, String>,
}

/// Audio normalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub min_input_bytes: usize,
}

/// Streaming session limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    pub config_timeout_ms: u64,
    pub chunk_size_limit: u32,
    pub min_chunk_bytes: usize,
    /// Send `chunk_received` for every binary frame.
    pub ack_chunks: bool,
}

/// Speech-to-text engines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub use_gpu: bool,
    pub threads: Option<usize>,
    pub no_speech_threshold: f32,
    /// Languages whose first candidate engine is loaded at startup.
    pub preload: Vec<String>,
}

/// Text-to-speech engines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    /// Appended to every synthesis chain.
    pub fallback: EngineBackend,
    /// Neural synthesizer executable (piper-compatible CLI). Unset disables it.
    pub neural_command: Option<String>,
    /// System synthesizer executable (espeak-ng-compatible CLI). Unset disables it.
    pub system_command: Option<String>,
    /// Cloud synthesis endpoint returning MP3 for `?q=&tl=&ttsspeed=`.
    pub cloud_url: String,
}

/// Transcript cleanup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Replaced by a space.
    pub control_tokens: Vec<String>,
    /// Removed without leaving a space.
    pub deleted_tokens: Vec<String>,
    /// Characters that, standing alone as every token, mark a transcript as noise.
    pub noise_alphabet: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_language: defaults::DEFAULT_LANGUAGE.to_string(),
            server: ServerConfig::default(),
            models: ModelsConfig::default(),
            audio: AudioConfig::default(),
            streaming: StreamingConfig::default(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
            normalizer: NormalizerConfig::default(),
            languages: BTreeMap::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            max_concurrent_requests: defaults::MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            auto_download: true,
            wipe_threshold_bytes: defaults::WIPE_THRESHOLD_BYTES,
            max_retries: defaults::MAX_RETRIES,
            retry_backoff_ms: defaults::RETRY_BACKOFF_MS,
            checksums: BTreeMap::new(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            min_input_bytes: defaults::MIN_INPUT_BYTES,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            config_timeout_ms: defaults::CONFIG_TIMEOUT_MS,
            chunk_size_limit: defaults::CHUNK_SIZE_LIMIT,
            min_chunk_bytes: defaults::MIN_CHUNK_BYTES,
            ack_chunks: true,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            use_gpu: true,
            threads: None,
            no_speech_threshold: defaults::NO_SPEECH_THRESHOLD,
            preload: Vec::new(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            fallback: EngineBackend::CloudSynth,
            neural_command: None,
            system_command: Some("espeak-ng".to_string()),
            cloud_url: "https://translate.google.com/translate_tts".to_string(),
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            control_tokens: defaults::CONTROL_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            deleted_tokens: defaults::DELETED_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            noise_alphabet: ('a'..='z').chain('A'..='Z').chain('0'..='9').collect(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXGATE_HOST → server.host
    /// - VOXGATE_PORT → server.port
    /// - VOXGATE_MODELS_DIR → models.dir
    /// - VOXGATE_LANGUAGE → default_language
    /// - VOXGATE_FFMPEG → audio.ffmpeg
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("VOXGATE_HOST")
            && !host.is_empty()
        {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("VOXGATE_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }

        if let Ok(dir) = std::env::var("VOXGATE_MODELS_DIR")
            && !dir.is_empty()
        {
            self.models.dir = Some(PathBuf::from(dir));
        }

        if let Ok(language) = std::env::var("VOXGATE_LANGUAGE")
            && !language.is_empty()
        {
            self.default_language = language;
        }

        if let Ok(ffmpeg) = std::env::var("VOXGATE_FFMPEG")
            && !ffmpeg.is_empty()
        {
            self.audio.ffmpeg = ffmpeg;
        }

        self
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |key: &str, message: &str| VoxgateError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.streaming.chunk_size_limit == 0 {
            return Err(invalid("streaming.chunk_size_limit", "must be greater than 0"));
        }
        if self.streaming.min_chunk_bytes as u64 > u64::from(self.streaming.chunk_size_limit) {
            return Err(invalid(
                "streaming.min_chunk_bytes",
                "must not exceed streaming.chunk_size_limit",
            ));
        }
        if self.server.max_concurrent_requests == 0 {
            return Err(invalid("server.max_concurrent_requests", "must be greater than 0"));
        }
        if !self.tts.fallback.is_tts() {
            return Err(invalid(
                "tts.fallback",
                &format!("'{}' is not a synthesis backend", self.tts.fallback),
            ));
        }
        for (key, sha256) in &self.models.checksums {
            if sha256.len() != 64 || !sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid(
                    &format!("models.checksums.{key}"),
                    "must be a 64-digit hex SHA-256",
                ));
            }
        }
        for (code, profile) in &self.languages {
            if profile.stt.is_empty() {
                return Err(invalid(
                    &format!("languages.{code}.stt"),
                    "must list at least one transcriber",
                ));
            }
            if let Some(backend) = profile.stt.iter().find(|b| !b.is_stt()) {
                return Err(invalid(
                    &format!("languages.{code}.stt"),
                    &format!("'{backend}' is not a transcriber backend"),
                ));
            }
            if let Some(backend) = profile.tts.iter().find(|b| !b.is_tts()) {
                return Err(invalid(
                    &format!("languages.{code}.tts"),
                    &format!("'{backend}' is not a synthesis backend"),
                ));
            }
        }
        Ok(())
    }

    /// Profile for a canonical language code: configured override first,
    /// then the built-in profile.
    pub fn language_profile(&self, language: &str) -> LanguageProfile {
        self.languages
            .get(language)
            .cloned()
            .unwrap_or_else(|| LanguageProfile::builtin(language))
    }

    /// Messages for a language, in its own words when a profile has them.
    pub fn messages(&self, language: &str) -> Messages {
        self.language_profile(&crate::language::canonicalize(language))
            .messages
    }

    /// Directory holding one subdirectory per artifact variant.
    pub fn models_dir(&self) -> PathBuf {
        self.models
            .dir
            .clone()
            .unwrap_or_else(crate::models::default_models_dir)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxgate/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("voxgate")
            .join("config.toml")
    }
}
