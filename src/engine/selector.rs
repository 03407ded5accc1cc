//! Candidate engine ordering per language and priority.
//!
//! Pure: the same config, capabilities, language and priority always give
//! the same list. Callers walk the list, loading each key through the model
//! cache until one works.

use crate::config::{Config, LanguageProfile};
use crate::engine::{Capabilities, EngineBackend, EngineKey, PriorityHint};
use crate::language::canonicalize;
use std::sync::Arc;

pub struct EngineSelector {
    config: Arc<Config>,
    capabilities: Capabilities,
}

impl EngineSelector {
    pub fn new(config: Arc<Config>, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Ordered transcriber keys for a request.
    ///
    /// Priority only changes which variant each backend runs.
    pub fn candidates(&self, language: &str, priority: PriorityHint) -> Vec<EngineKey> {
        let language = canonicalize(language);
        let profile = self.config.language_profile(&language);

        let mut keys: Vec<EngineKey> = Vec::new();
        for &backend in &profile.stt {
            if !self.capabilities.supports(backend) {
                continue;
            }
            let Some(variant) = stt_variant(&profile, backend, priority) else {
                continue;
            };
            let key = EngineKey::new(backend, variant, language.as_str());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Ordered synthesizer keys, ending with the configured fallback.
    pub fn synthesis_chain(&self, language: &str) -> Vec<EngineKey> {
        let language = canonicalize(language);
        let profile = self.config.language_profile(&language);

        let mut backends = profile.tts.clone();
        if !backends.contains(&self.config.tts.fallback) {
            backends.push(self.config.tts.fallback);
        }

        let mut keys: Vec<EngineKey> = Vec::new();
        for backend in backends {
            if !self.capabilities.supports(backend) {
                continue;
            }
            let Some(variant) = tts_variant(&profile, backend, &language) else {
                continue;
            };
            let key = EngineKey::new(backend, variant, language.as_str());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

fn stt_variant(profile: &LanguageProfile, backend: EngineBackend, priority: PriorityHint) -> Option<String> {
    match backend {
        EngineBackend::GeneralTranscriber => Some(profile.general.pick(priority).to_string()),
        EngineBackend::FastTranscriber => Some(profile.fast.pick(priority).to_string()),
        EngineBackend::LanguageSpecialized => profile.specialized.clone(),
        _ => None,
    }
}

fn tts_variant(profile: &LanguageProfile, backend: EngineBackend, language: &str) -> Option<String> {
    match backend {
        EngineBackend::NeuralSynth => profile.neural_voice.clone(),
        EngineBackend::SystemSynth => Some(
            profile
                .system_voice
                .clone()
                .unwrap_or_else(|| language.to_string()),
        ),
        EngineBackend::CloudSynth => Some("cloud".to_string()),
        _ => None,
    }
}
