//! Whisper transcription engine.
//!
//! Backs the general, fast and language-specialized transcriber backends;
//! they differ only in which ggml artifact is loaded.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (and cmake at build time).
//! Without it, construction fails with `EngineLoadFailed` so the selector
//! falls through to the next candidate.

use crate::error::{Result, VoxgateError};
use crate::stt::transcriber::{SpeechToText, TranscribeOptions, Transcription};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use crate::stt::transcriber::TranscriptSegment;
#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for one Whisper engine instance.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file
    pub model_path: PathBuf,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
    pub use_gpu: bool,
}

impl WhisperConfig {
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            threads: None,
            use_gpu: true,
        }
    }
}

fn model_name(config: &WhisperConfig) -> String {
    config
        .model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Convert i16 samples to f32 in [-1.0, 1.0].
pub fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Whisper-based engine.
///
/// The context sits behind a mutex: whisper.cpp state creation is not safe
/// to run concurrently on one context.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("name", &self.name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Load a ggml model. Blocking; run it off the async runtime.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let name = model_name(&config);
        let load_failed = |message: String| VoxgateError::EngineLoadFailed {
            key: name.clone(),
            message,
        };

        if !config.model_path.exists() {
            return Err(load_failed(format!(
                "model file not found: {}",
                config.model_path.display()
            )));
        }

        let mut context_params = WhisperContextParameters::default();
        context_params.use_gpu(config.use_gpu);
        context_params.flash_attn(true);
        let path = config
            .model_path
            .to_str()
            .ok_or_else(|| load_failed("invalid UTF-8 in model path".to_string()))?;
        let context = WhisperContext::new_with_params(path, context_params)
            .map_err(|e| load_failed(format!("failed to load Whisper model: {e}")))?;

        tracing::info!(model = %name, path = %config.model_path.display(), "whisper model loaded");
        Ok(Self {
            context: Mutex::new(context),
            config,
            name,
        })
    }

    fn inference_error(&self, message: String) -> VoxgateError {
        VoxgateError::InferenceFailed {
            engine: self.name.clone(),
            message,
        }
    }
}

#[cfg(feature = "whisper")]
impl SpeechToText for WhisperEngine {
    fn transcribe(&self, audio: &[i16], options: &TranscribeOptions) -> Result<Transcription> {
        let audio_f32 = convert_audio(audio);

        let context = self
            .context
            .lock()
            .map_err(|e| self.inference_error(format!("failed to acquire context lock: {e}")))?;

        let mut state = context
            .create_state()
            .map_err(|e| self.inference_error(format!("failed to create Whisper state: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&options.language));
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio_f32)
            .map_err(|e| self.inference_error(format!("Whisper inference failed: {e}")))?;

        // Timestamps are in centiseconds.
        let segments = state
            .as_iter()
            .filter(|segment| segment.no_speech_probability() <= options.no_speech_threshold)
            .map(|segment| {
                TranscriptSegment::new(
                    &segment.to_string(),
                    segment.start_timestamp() as f32 / 100.0,
                    segment.end_timestamp() as f32 / 100.0,
                )
            })
            .collect();

        Ok(Transcription::from_segments(segments))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Whisper engine placeholder (without whisper feature).
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine {
    name: String,
}

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Always fails: this build has no speech recognition compiled in.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        Err(VoxgateError::EngineLoadFailed {
            key: model_name(&config),
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release --features whisper (requires cmake)"
            )
            .to_string(),
        })
    }
}

#[cfg(not(feature = "whisper"))]
impl SpeechToText for WhisperEngine {
    fn transcribe(&self, _audio: &[i16], _options: &TranscribeOptions) -> Result<Transcription> {
        Err(VoxgateError::InferenceFailed {
            engine: self.name.clone(),
            message: "Whisper feature not enabled".to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
