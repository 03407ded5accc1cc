use crate::error::{Result, VoxgateError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for text-to-speech engines.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<SynthesizedAudio>;

    /// Name reported as the synthesis source.
    fn name(&self) -> &str;
}

/// Encoding of synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

/// Normalized voice request.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    pub language: String,
    /// One of `neutral`, `female`, `male`.
    pub voice: String,
    /// Playback speed factor, 1.0 is normal.
    pub speed: f32,
}

impl VoiceParams {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            voice: crate::defaults::DEFAULT_VOICE.to_string(),
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Mock synthesizer for testing
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    name: String,
    should_fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockSynthesizer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            should_fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to fail on synthesize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextToSpeech for MockSynthesizer {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(VoxgateError::InferenceFailed {
                engine: self.name.clone(),
                message: "mock synthesis failure".to_string(),
            });
        }
        Ok(SynthesizedAudio {
            bytes: format!("{}|{}|{}|{}", self.name, params.language, params.voice, text)
                .into_bytes(),
            format: AudioFormat::Wav,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
