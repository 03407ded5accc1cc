//! Turning an [`EngineKey`] into a live engine.

use crate::config::Config;
use crate::engine::{EngineBackend, EngineHandle, EngineKey};
use crate::error::{Result, VoxgateError};
use crate::models::ArtifactStore;
use crate::stt::{MockTranscriber, SpeechToText, WhisperConfig, WhisperEngine};
use crate::tts::{MockSynthesizer, NeuralSynth, SystemSynth, TextToSpeech};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builds engines for the model cache.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self, key: &EngineKey) -> Result<EngineHandle>;
}

/// Loader used by the server: makes sure artifacts are on disk, then
/// constructs the backend.
pub struct DefaultEngineLoader {
    config: Arc<Config>,
    store: Arc<ArtifactStore>,
}

impl DefaultEngineLoader {
    pub fn new(config: Arc<Config>, store: Arc<ArtifactStore>) -> Self {
        Self { config, store }
    }

    async fn ready_weights(&self, key: &EngineKey) -> Result<std::path::PathBuf> {
        self.store
            .ensure_ready(&key.variant)
            .await
            .map_err(|e| match e {
                VoxgateError::ArtifactUnavailable { .. } => e,
                other => VoxgateError::ArtifactUnavailable {
                    variant: key.variant.clone(),
                    message: other.to_string(),
                },
            })?;
        self.store.weights_path(&key.variant)
    }

    async fn load_transcriber(&self, key: &EngineKey) -> Result<Arc<dyn SpeechToText>> {
        let model_path = self.ready_weights(key).await?;
        let whisper_config = WhisperConfig {
            model_path,
            threads: self.config.stt.threads,
            use_gpu: self.config.stt.use_gpu,
        };
        let display = key.to_string();
        // Model loading reads hundreds of megabytes; keep it off the runtime threads.
        let engine = tokio::task::spawn_blocking(move || WhisperEngine::new(whisper_config))
            .await
            .map_err(|e| VoxgateError::EngineLoadFailed {
                key: display.clone(),
                message: format!("loader task failed: {e}"),
            })?
            .map_err(|e| VoxgateError::EngineLoadFailed {
                key: display,
                message: e.to_string(),
            })?;
        Ok(Arc::new(engine))
    }

    async fn load_synthesizer(&self, key: &EngineKey) -> Result<Arc<dyn TextToSpeech>> {
        let not_configured = |what: &str| VoxgateError::EngineLoadFailed {
            key: key.to_string(),
            message: format!("{what} is not configured"),
        };
        match key.backend {
            EngineBackend::NeuralSynth => {
                let command = self
                    .config
                    .tts
                    .neural_command
                    .as_deref()
                    .ok_or_else(|| not_configured("tts.neural_command"))?;
                let model_path = self.ready_weights(key).await?;
                Ok(Arc::new(NeuralSynth::new(command, model_path)))
            }
            EngineBackend::SystemSynth => {
                let command = self
                    .config
                    .tts
                    .system_command
                    .as_deref()
                    .ok_or_else(|| not_configured("tts.system_command"))?;
                Ok(Arc::new(SystemSynth::new(command, &key.variant)))
            }
            EngineBackend::CloudSynth => self.cloud_synth(key),
            _ => Err(VoxgateError::EngineLoadFailed {
                key: key.to_string(),
                message: "not a synthesis backend".to_string(),
            }),
        }
    }

    #[cfg(feature = "cloud-synth")]
    fn cloud_synth(&self, _key: &EngineKey) -> Result<Arc<dyn TextToSpeech>> {
        Ok(Arc::new(crate::tts::CloudSynth::new(&self.config.tts.cloud_url)))
    }

    #[cfg(not(feature = "cloud-synth"))]
    fn cloud_synth(&self, key: &EngineKey) -> Result<Arc<dyn TextToSpeech>> {
        Err(VoxgateError::EngineLoadFailed {
            key: key.to_string(),
            message: "built without the cloud-synth feature".to_string(),
        })
    }
}

#[async_trait]
impl EngineLoader for DefaultEngineLoader {
    async fn load(&self, key: &EngineKey) -> Result<EngineHandle> {
        if key.backend.is_stt() {
            Ok(EngineHandle::Stt(self.load_transcriber(key).await?))
        } else {
            Ok(EngineHandle::Tts(self.load_synthesizer(key).await?))
        }
    }
}

type SttFactory = Box<dyn Fn(&EngineKey) -> MockTranscriber + Send + Sync>;

/// Loader producing mock engines, with knobs for delays and failures.
pub struct MockEngineLoader {
    delay: Duration,
    failures_left: AtomicUsize,
    failing_backends: HashSet<EngineBackend>,
    stt: SttFactory,
    counts: Mutex<HashMap<EngineKey, usize>>,
}

impl MockEngineLoader {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            failures_left: AtomicUsize::new(0),
            failing_backends: HashSet::new(),
            stt: Box::new(|key| MockTranscriber::new(&key.to_string())),
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Sleep this long inside every load.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first `n` loads, whatever their key.
    pub fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Always fail loads of this backend.
    pub fn failing_backend(mut self, backend: EngineBackend) -> Self {
        self.failing_backends.insert(backend);
        self
    }

    /// Build transcribers with a custom factory.
    pub fn with_stt(mut self, factory: impl Fn(&EngineKey) -> MockTranscriber + Send + Sync + 'static) -> Self {
        self.stt = Box::new(factory);
        self
    }

    pub fn load_count(&self, key: &EngineKey) -> usize {
        self.counts
            .lock()
            .map(|counts| counts.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.counts
            .lock()
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }
}

impl Default for MockEngineLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineLoader for MockEngineLoader {
    async fn load(&self, key: &EngineKey) -> Result<EngineHandle> {
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(key.clone()).or_default() += 1;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail_now = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail_now || self.failing_backends.contains(&key.backend) {
            return Err(VoxgateError::EngineLoadFailed {
                key: key.to_string(),
                message: "mock load failure".to_string(),
            });
        }

        if key.backend.is_stt() {
            Ok(EngineHandle::Stt(Arc::new((self.stt)(key))))
        } else {
            Ok(EngineHandle::Tts(Arc::new(MockSynthesizer::new(
                &key.to_string(),
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactStore, OfflineFetcher, StorePolicy};
    use tempfile::TempDir;

    fn default_loader(dir: &TempDir, config: Config) -> DefaultEngineLoader {
        let store = ArtifactStore::new(dir.path(), Arc::new(OfflineFetcher), StorePolicy::default());
        DefaultEngineLoader::new(Arc::new(config), Arc::new(store))
    }

    #[tokio::test]
    async fn test_missing_artifact_is_artifact_unavailable() {
        let dir = TempDir::new().unwrap();
        let loader = default_loader(&dir, Config::default());
        let key = EngineKey::new(EngineBackend::GeneralTranscriber, "small", "en");
        let err = loader.load(&key).await.unwrap_err();
        assert!(matches!(err, VoxgateError::ArtifactUnavailable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_unknown_variant_is_artifact_unavailable() {
        let dir = TempDir::new().unwrap();
        let loader = default_loader(&dir, Config::default());
        let key = EngineKey::new(EngineBackend::FastTranscriber, "huge-q1", "en");
        let err = loader.load(&key).await.unwrap_err();
        assert!(matches!(err, VoxgateError::ArtifactUnavailable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_system_synth_loads_without_artifacts() {
        let dir = TempDir::new().unwrap();
        let loader = default_loader(&dir, Config::default());
        let key = EngineKey::new(EngineBackend::SystemSynth, "fi", "fi");
        let handle = loader.load(&key).await.unwrap();
        assert_eq!(handle.as_tts().unwrap().name(), "system");
    }

    #[tokio::test]
    async fn test_unconfigured_neural_synth_fails() {
        let dir = TempDir::new().unwrap();
        let loader = default_loader(&dir, Config::default());
        let key = EngineKey::new(EngineBackend::NeuralSynth, "en_US-lessac-medium", "en");
        let err = loader.load(&key).await.unwrap_err();
        assert!(err.to_string().contains("tts.neural_command"));
    }

    #[tokio::test]
    async fn test_mock_loader_counts_and_fails() {
        let loader = MockEngineLoader::new()
            .failing_first(1)
            .failing_backend(EngineBackend::LanguageSpecialized);
        let key = EngineKey::new(EngineBackend::FastTranscriber, "base", "en");
        assert!(loader.load(&key).await.is_err());
        assert!(loader.load(&key).await.is_ok());
        let special = EngineKey::new(EngineBackend::LanguageSpecialized, "fi-specialized", "fi");
        assert!(loader.load(&special).await.is_err());
        assert_eq!(loader.load_count(&key), 2);
        assert_eq!(loader.total_loads(), 3);
    }
}
