//! Which engine backends this process can run.
//!
//! Resolved once at startup from compiled features and configured tools, so
//! candidate selection never probes the system per request.

use crate::config::Config;
use crate::engine::EngineBackend;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    available: BTreeSet<EngineBackend>,
}

impl Capabilities {
    pub fn from_config(config: &Config) -> Self {
        let mut available = BTreeSet::new();
        if cfg!(feature = "whisper") {
            available.extend([
                EngineBackend::GeneralTranscriber,
                EngineBackend::FastTranscriber,
                EngineBackend::LanguageSpecialized,
            ]);
        }
        if config.tts.neural_command.is_some() {
            available.insert(EngineBackend::NeuralSynth);
        }
        if config.tts.system_command.is_some() {
            available.insert(EngineBackend::SystemSynth);
        }
        if cfg!(feature = "cloud-synth") {
            available.insert(EngineBackend::CloudSynth);
        }
        Self { available }
    }

    /// Every backend; for tests and custom loaders.
    pub fn all() -> Self {
        Self::with(EngineBackend::ALL)
    }

    pub fn with(backends: impl IntoIterator<Item = EngineBackend>) -> Self {
        Self {
            available: backends.into_iter().collect(),
        }
    }

    pub fn supports(&self, backend: EngineBackend) -> bool {
        self.available.contains(&backend)
    }

    pub fn backends(&self) -> impl Iterator<Item = EngineBackend> + '_ {
        self.available.iter().copied()
    }
}
