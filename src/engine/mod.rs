//! Engine identities, the shared model cache and the selection policy.
//!
//! An [`EngineKey`] names one loadable engine instance: which backend, which
//! artifact variant it runs, and which language it serves. The
//! [`EngineSelector`] turns a request into an ordered list of keys and the
//! [`ModelCache`] turns a key into a shared [`EngineHandle`].

pub mod cache;
pub mod capabilities;
pub mod loader;
pub mod selector;

pub use cache::ModelCache;
pub use capabilities::Capabilities;
pub use loader::{DefaultEngineLoader, EngineLoader};
pub use selector::EngineSelector;

use crate::error::VoxgateError;
use crate::stt::SpeechToText;
use crate::tts::TextToSpeech;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineBackend {
    GeneralTranscriber,
    FastTranscriber,
    LanguageSpecialized,
    NeuralSynth,
    CloudSynth,
    SystemSynth,
}

impl EngineBackend {
    pub const ALL: [EngineBackend; 6] = [
        EngineBackend::GeneralTranscriber,
        EngineBackend::FastTranscriber,
        EngineBackend::LanguageSpecialized,
        EngineBackend::NeuralSynth,
        EngineBackend::CloudSynth,
        EngineBackend::SystemSynth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineBackend::GeneralTranscriber => "general_transcriber",
            EngineBackend::FastTranscriber => "fast_transcriber",
            EngineBackend::LanguageSpecialized => "language_specialized",
            EngineBackend::NeuralSynth => "neural_synth",
            EngineBackend::CloudSynth => "cloud_synth",
            EngineBackend::SystemSynth => "system_synth",
        }
    }

    pub fn is_stt(&self) -> bool {
        matches!(
            self,
            EngineBackend::GeneralTranscriber
                | EngineBackend::FastTranscriber
                | EngineBackend::LanguageSpecialized
        )
    }

    pub fn is_tts(&self) -> bool {
        !self.is_stt()
    }
}

impl fmt::Display for EngineBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineBackend {
    type Err = VoxgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngineBackend::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| VoxgateError::ConfigInvalidValue {
                key: "engine".to_string(),
                message: format!("unknown engine backend '{s}'"),
            })
    }
}

/// Caller preference between latency and quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityHint {
    Speed,
    #[default]
    Accuracy,
}

impl FromStr for PriorityHint {
    type Err = VoxgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "speed" | "fast" => Ok(PriorityHint::Speed),
            "accuracy" | "quality" => Ok(PriorityHint::Accuracy),
            other => Err(VoxgateError::InvalidRequest {
                message: format!("unknown priority '{other}'"),
            }),
        }
    }
}

/// Identity of one loadable engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineKey {
    pub backend: EngineBackend,
    pub variant: String,
    pub language: String,
}

impl EngineKey {
    pub fn new(backend: EngineBackend, variant: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            backend,
            variant: variant.into(),
            language: language.into(),
        }
    }
}

impl fmt::Display for EngineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.backend, self.variant, self.language)
    }
}

/// A loaded engine, shared by every caller that asked for the same key.
#[derive(Clone)]
pub enum EngineHandle {
    Stt(Arc<dyn SpeechToText>),
    Tts(Arc<dyn TextToSpeech>),
}

impl EngineHandle {
    pub fn as_stt(&self) -> Option<Arc<dyn SpeechToText>> {
        match self {
            EngineHandle::Stt(engine) => Some(Arc::clone(engine)),
            EngineHandle::Tts(_) => None,
        }
    }

    pub fn as_tts(&self) -> Option<Arc<dyn TextToSpeech>> {
        match self {
            EngineHandle::Tts(engine) => Some(Arc::clone(engine)),
            EngineHandle::Stt(_) => None,
        }
    }

    /// True when both handles point at the same engine instance.
    pub fn same_instance(&self, other: &EngineHandle) -> bool {
        match (self, other) {
            (EngineHandle::Stt(a), EngineHandle::Stt(b)) => Arc::ptr_eq(a, b),
            (EngineHandle::Tts(a), EngineHandle::Tts(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineHandle::Stt(engine) => write!(f, "EngineHandle::Stt({})", engine.name()),
            EngineHandle::Tts(engine) => write!(f, "EngineHandle::Tts({})", engine.name()),
        }
    }
}
