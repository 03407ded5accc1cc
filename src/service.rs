//! Speech gateway composition root.
//!
//! Wires selector → cache → audio pipeline → engine → normalizer for
//! transcription, and selector → cache → synthesizer chain for synthesis.
//! The HTTP handlers and streaming sessions only talk to [`SpeechService`].

use crate::audio::{AudioPipeline, FfmpegTranscoder, NormalizedAudio, SourceHint, Transcoder};
use crate::config::Config;
use crate::engine::{
    Capabilities, DefaultEngineLoader, EngineBackend, EngineKey, EngineLoader, EngineSelector,
    ModelCache, PriorityHint,
};
use crate::error::{Result, VoxgateError};
use crate::language::{BUILTIN_LANGUAGES, canonicalize, display_name};
use crate::models::{ArtifactState, ArtifactStore, StorePolicy, default_fetcher};
use crate::normalizer::TranscriptNormalizer;
use crate::stt::{SpeechToText, TranscribeOptions, TranscriptSegment, Transcription};
use crate::tts::{AudioFormat, VoiceParams, clamp_speed, normalize_voice};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A transcriber bound to the key it was loaded under.
#[derive(Clone)]
pub struct BoundTranscriber {
    pub key: EngineKey,
    pub engine: Arc<dyn SpeechToText>,
}

impl std::fmt::Debug for BoundTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTranscriber")
            .field("key", &self.key)
            .field("engine", &self.engine.name())
            .finish()
    }
}

/// What a transcription request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Transcript {
        text: String,
        segments: Vec<TranscriptSegment>,
        engine: String,
    },
    /// The engine heard nothing.
    NoSpeech { message: String },
    /// The engine produced only isolated characters.
    NoiseRejected { message: String },
    /// Too little audio to try.
    TooShort { message: String },
}

/// Result of a synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub audio: Vec<u8>,
    pub format: AudioFormat,
    /// Backend that produced the audio.
    pub source: String,
    pub language: String,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: String,
    pub gpu_backend: &'static str,
    pub capabilities: Vec<EngineBackend>,
    pub loaded_engines: Vec<String>,
    pub artifacts: Vec<ArtifactState>,
    pub active_sessions: usize,
}

/// What one language can do on this host.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LanguageSupport {
    pub code: String,
    pub name: String,
    /// Configured transcriber backends, in preference order.
    pub stt_support: Vec<EngineBackend>,
    /// Configured synthesis backends including the fallback.
    pub tts_support: Vec<EngineBackend>,
    pub stt_available: bool,
    pub tts_available: bool,
}

/// A voice name accepted by `/synthesize`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamingStatus {
    pub active_connections: usize,
    pub websocket_enabled: bool,
    /// Transcriber backends this host can run.
    pub transcribers: Vec<EngineBackend>,
}

/// Decrements the active-session counter when dropped.
pub struct SessionGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SpeechService {
    config: Arc<Config>,
    selector: EngineSelector,
    cache: ModelCache,
    store: Arc<ArtifactStore>,
    pipeline: AudioPipeline,
    normalizer: TranscriptNormalizer,
    active_sessions: Arc<AtomicUsize>,
}

/// Builder for [`SpeechService`]; every collaborator defaults to the
/// production one derived from the config.
pub struct SpeechServiceBuilder {
    config: Config,
    capabilities: Option<Capabilities>,
    loader: Option<Arc<dyn EngineLoader>>,
    transcoder: Option<Arc<dyn Transcoder>>,
    store: Option<Arc<ArtifactStore>>,
}

impl SpeechServiceBuilder {
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn EngineLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    pub fn store(mut self, store: Arc<ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<SpeechService> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let store = self.store.unwrap_or_else(|| {
            Arc::new(ArtifactStore::new(
                config.models_dir(),
                default_fetcher(config.models.auto_download),
                StorePolicy::from(&config.models),
            ))
        });
        let loader = self.loader.unwrap_or_else(|| {
            Arc::new(DefaultEngineLoader::new(
                Arc::clone(&config),
                Arc::clone(&store),
            ))
        });
        let transcoder = self
            .transcoder
            .unwrap_or_else(|| Arc::new(FfmpegTranscoder::from(&config.audio)));
        let capabilities = self
            .capabilities
            .unwrap_or_else(|| Capabilities::from_config(&config));

        tracing::info!(
            backends = ?capabilities.backends().collect::<Vec<_>>(),
            models_dir = %store.root().display(),
            "speech service ready"
        );

        Ok(SpeechService {
            selector: EngineSelector::new(Arc::clone(&config), capabilities),
            cache: ModelCache::new(loader),
            pipeline: AudioPipeline::new(transcoder, config.audio.min_input_bytes),
            normalizer: TranscriptNormalizer::new(Arc::clone(&config)),
            store,
            config,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl SpeechService {
    pub fn builder(config: Config) -> SpeechServiceBuilder {
        SpeechServiceBuilder {
            config,
            capabilities: None,
            loader: None,
            transcoder: None,
            store: None,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn selector(&self) -> &EngineSelector {
        &self.selector
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &AudioPipeline {
        &self.pipeline
    }

    /// Walk the candidate list until one transcriber loads.
    ///
    /// Load failures fall through to the next candidate; running out of
    /// candidates is `NoEngineAvailable`.
    pub async fn bind_transcriber(&self, language: &str, priority: PriorityHint) -> Result<BoundTranscriber> {
        let language = canonicalize(language);
        let candidates = self.selector.candidates(&language, priority);

        for key in &candidates {
            match self.cache.get_or_load(key).await {
                Ok(handle) => {
                    if let Some(engine) = handle.as_stt() {
                        tracing::debug!(%key, "transcriber bound");
                        return Ok(BoundTranscriber {
                            key: key.clone(),
                            engine,
                        });
                    }
                    tracing::warn!(%key, "cached engine is not a transcriber");
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "transcriber unavailable, trying next candidate");
                }
            }
        }

        Err(VoxgateError::NoEngineAvailable {
            language,
            attempts: candidates.len(),
        })
    }

    /// Run a bound transcriber on a blocking thread.
    pub async fn run_inference(&self, bound: &BoundTranscriber, pcm: Vec<i16>, language: &str) -> Result<Transcription> {
        let engine = Arc::clone(&bound.engine);
        let options = TranscribeOptions {
            language: canonicalize(language),
            no_speech_threshold: self.config.stt.no_speech_threshold,
        };
        let engine_name = bound.key.to_string();

        tokio::task::spawn_blocking(move || engine.transcribe(&pcm, &options))
            .await
            .map_err(|e| VoxgateError::InferenceFailed {
                engine: engine_name,
                message: format!("inference task failed: {e}"),
            })?
    }

    /// Turn raw engine output into an outcome.
    pub fn finish(&self, key: &EngineKey, transcription: Transcription, language: &str) -> TranscriptOutcome {
        let messages = self.config.messages(language);
        let cleaned = self.normalizer.clean(&transcription.text, language);

        if cleaned.noise_rejected {
            return TranscriptOutcome::NoiseRejected {
                message: cleaned.text,
            };
        }
        if cleaned.text.is_empty() {
            return TranscriptOutcome::NoSpeech {
                message: messages.no_speech,
            };
        }

        let segments = transcription
            .segments
            .into_iter()
            .filter_map(|segment| {
                let text = self.normalizer.strip(&segment.text);
                (!text.is_empty()).then(|| TranscriptSegment { text, ..segment })
            })
            .collect();

        TranscriptOutcome::Transcript {
            text: cleaned.text,
            segments,
            engine: key.to_string(),
        }
    }

    /// Transcribe one self-contained piece of audio.
    pub async fn transcribe(
        &self,
        audio: &[u8],
        hint: SourceHint,
        language: &str,
        priority: PriorityHint,
    ) -> Result<TranscriptOutcome> {
        let language = canonicalize(language);

        let pcm = match self.pipeline.normalize(audio, hint).await? {
            NormalizedAudio::Pcm(pcm) => pcm,
            NormalizedAudio::TooShort { bytes } => {
                tracing::debug!(bytes, %language, "audio too short to transcribe");
                return Ok(TranscriptOutcome::TooShort {
                    message: self.config.messages(&language).too_short,
                });
            }
        };

        let bound = self.bind_transcriber(&language, priority).await?;
        let samples = pcm.len();
        let transcription = self.run_inference(&bound, pcm, &language).await?;
        tracing::info!(engine = %bound.key, samples, "transcribed");

        Ok(self.finish(&bound.key, transcription, &language))
    }

    /// Synthesize speech, trying each engine of the language's chain in turn.
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: Option<&str>,
        speed: Option<f32>,
    ) -> Result<Synthesis> {
        if text.trim().is_empty() {
            return Err(VoxgateError::InvalidRequest {
                message: "text is empty".to_string(),
            });
        }

        let language = canonicalize(language);
        let params = VoiceParams {
            language: language.clone(),
            voice: normalize_voice(voice),
            speed: clamp_speed(speed),
        };
        let chain = self.selector.synthesis_chain(&language);

        for key in &chain {
            let engine = match self.cache.get_or_load(key).await {
                Ok(handle) => match handle.as_tts() {
                    Some(engine) => engine,
                    None => continue,
                },
                Err(e) => {
                    tracing::warn!(%key, error = %e, "synthesizer unavailable, trying next");
                    continue;
                }
            };

            match engine.synthesize(text, &params).await {
                Ok(audio) => {
                    tracing::info!(%key, bytes = audio.bytes.len(), "synthesized");
                    return Ok(Synthesis {
                        audio: audio.bytes,
                        format: audio.format,
                        source: key.backend.as_str().to_string(),
                        language,
                        voice: params.voice,
                    });
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "synthesis failed, trying next");
                }
            }
        }

        Err(VoxgateError::NoEngineAvailable {
            language,
            attempts: chain.len(),
        })
    }

    /// Load the first transcriber of every configured preload language.
    ///
    /// Returns how many languages got an engine. Failures are logged only.
    pub async fn preload(&self) -> usize {
        let mut loaded = 0;
        for language in &self.config.stt.preload {
            match self.bind_transcriber(language, PriorityHint::Accuracy).await {
                Ok(bound) => {
                    tracing::info!(key = %bound.key, "preloaded");
                    loaded += 1;
                }
                Err(e) => tracing::warn!(%language, error = %e, "preload failed"),
            }
        }
        loaded
    }

    /// Count a streaming session as active until the guard drops.
    pub fn session_guard(&self) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            counter: Arc::clone(&self.active_sessions),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Built-in, configured and default languages with their engine support.
    pub fn supported_languages(&self) -> Vec<LanguageSupport> {
        let mut codes: Vec<String> = BUILTIN_LANGUAGES
            .iter()
            .map(|(code, _)| code.to_string())
            .chain(self.config.languages.keys().map(|code| canonicalize(code)))
            .chain(std::iter::once(canonicalize(&self.config.default_language)))
            .collect();
        codes.sort();
        codes.dedup();

        codes
            .into_iter()
            .map(|code| {
                let profile = self.config.language_profile(&code);
                let mut tts_support = profile.tts.clone();
                if !tts_support.contains(&self.config.tts.fallback) {
                    tts_support.push(self.config.tts.fallback);
                }
                LanguageSupport {
                    name: display_name(&code).unwrap_or(code.as_str()).to_string(),
                    stt_available: !self.selector.candidates(&code, PriorityHint::Accuracy).is_empty(),
                    tts_available: !self.selector.synthesis_chain(&code).is_empty(),
                    stt_support: profile.stt,
                    tts_support,
                    code,
                }
            })
            .collect()
    }

    /// Voice names with whether any engine here can honor them.
    ///
    /// Only the system synthesizer has gendered variants; every synthesis
    /// backend speaks the neutral voice.
    pub fn supported_voices(&self) -> Vec<VoiceInfo> {
        let capabilities = self.selector.capabilities();
        let any_synth = capabilities.backends().any(|b| b.is_tts());
        let gendered = capabilities.supports(EngineBackend::SystemSynth);
        vec![
            VoiceInfo {
                id: "neutral",
                name: "Neutral",
                description: "Default voice of each engine",
                available: any_synth,
            },
            VoiceInfo {
                id: "female",
                name: "Female",
                description: "Female system voice variant",
                available: gendered,
            },
            VoiceInfo {
                id: "male",
                name: "Male",
                description: "Male system voice variant",
                available: gendered,
            },
        ]
    }

    pub fn streaming_status(&self) -> StreamingStatus {
        StreamingStatus {
            active_connections: self.active_sessions(),
            websocket_enabled: true,
            transcribers: self
                .selector
                .capabilities()
                .backends()
                .filter(EngineBackend::is_stt)
                .collect(),
        }
    }

    pub async fn health(&self) -> HealthReport {
        let store = Arc::clone(&self.store);
        let artifacts = tokio::task::spawn_blocking(move || store.list_states())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "artifact inspection task failed");
                Vec::new()
            });
        HealthReport {
            status: "ok",
            version: crate::version_string(),
            gpu_backend: crate::defaults::gpu_backend(),
            capabilities: self.selector.capabilities().backends().collect(),
            loaded_engines: self
                .cache
                .loaded_keys()
                .await
                .iter()
                .map(ToString::to_string)
                .collect(),
            artifacts,
            active_sessions: self.active_sessions(),
        }
    }
}
