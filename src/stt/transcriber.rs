use crate::error::{Result, VoxgateError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for speech-to-text engines.
///
/// Calls block; callers run them on a blocking thread. Implementations must
/// tolerate concurrent callers, serializing internally where the backend
/// requires it.
pub trait SpeechToText: Send + Sync {
    /// Transcribe 16 kHz mono 16-bit PCM.
    fn transcribe(&self, audio: &[i16], options: &TranscribeOptions) -> Result<Transcription>;

    /// Name of the loaded model, for logs and responses.
    fn name(&self) -> &str;
}

impl<T: SpeechToText> SpeechToText for Arc<T> {
    fn transcribe(&self, audio: &[i16], options: &TranscribeOptions) -> Result<Transcription> {
        (**self).transcribe(audio, options)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Per-call inference settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    /// Canonical language code passed to the engine.
    pub language: String,
    /// Segments judged more likely silence than speech are dropped.
    pub no_speech_threshold: f32,
}

impl TranscribeOptions {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            no_speech_threshold: crate::defaults::NO_SPEECH_THRESHOLD,
        }
    }
}

/// A timed piece of transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(rename = "start")]
    pub start_secs: f32,
    #[serde(rename = "end")]
    pub end_secs: f32,
}

impl TranscriptSegment {
    pub fn new(text: &str, start_secs: f32, end_secs: f32) -> Self {
        Self {
            text: text.to_string(),
            start_secs,
            end_secs,
        }
    }
}

/// Raw engine output, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcription {
    /// Build a transcription from segments in any order.
    ///
    /// Segments are sorted by start time and their trimmed texts joined with
    /// single spaces.
    pub fn from_segments(mut segments: Vec<TranscriptSegment>) -> Self {
        segments.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self { text, segments }
    }

    /// A transcription with a single untimed segment.
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            segments: Vec::new(),
        }
    }
}

/// Mock transcriber for testing
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    name: String,
    response: Transcription,
    should_fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: Transcription::from_text("mock transcription"),
            should_fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = Transcription::from_text(response);
        self
    }

    /// Configure the mock to return timed segments
    pub fn with_segments(mut self, segments: Vec<TranscriptSegment>) -> Self {
        self.response = Transcription::from_segments(segments);
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of `transcribe` calls so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechToText for MockTranscriber {
    fn transcribe(&self, _audio: &[i16], _options: &TranscribeOptions) -> Result<Transcription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            Err(VoxgateError::InferenceFailed {
                engine: self.name.clone(),
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new("test-model").with_response("Hello, this is a test");

        let result = transcriber
            .transcribe(&[0i16; 1000], &TranscribeOptions::new("en"))
            .unwrap();
        assert_eq!(result.text, "Hello, this is a test");
        assert_eq!(transcriber.calls(), 1);
    }

    #[test]
    fn test_mock_transcriber_returns_error_when_configured() {
        let transcriber = MockTranscriber::new("test-model").with_failure();

        match transcriber.transcribe(&[0i16; 10], &TranscribeOptions::new("en")) {
            Err(VoxgateError::InferenceFailed { engine, message }) => {
                assert_eq!(engine, "test-model");
                assert_eq!(message, "mock transcription failure");
            }
            other => panic!("Expected InferenceFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_call_counter_shared_between_clones() {
        let transcriber = MockTranscriber::new("m");
        let clone = transcriber.clone();
        clone
            .transcribe(&[], &TranscribeOptions::new("en"))
            .unwrap();
        assert_eq!(transcriber.calls(), 1);
    }

    #[test]
    fn test_segments_sorted_and_joined() {
        let transcription = Transcription::from_segments(vec![
            TranscriptSegment::new(" world", 1.5, 2.0),
            TranscriptSegment::new("hello ", 0.0, 1.5),
            TranscriptSegment::new("  ", 2.0, 2.1),
        ]);
        assert_eq!(transcription.text, "hello world");
        assert_eq!(transcription.segments[0].start_secs, 0.0);
        assert!(
            transcription
                .segments
                .windows(2)
                .all(|w| w[0].start_secs <= w[1].start_secs)
        );
    }

    #[test]
    fn test_segment_wire_names() {
        let json = serde_json::to_value(TranscriptSegment::new("hei", 0.5, 1.0)).unwrap();
        assert_eq!(json["text"], "hei");
        assert_eq!(json["start"], 0.5);
        assert_eq!(json["end"], 1.0);
    }

    #[test]
    fn test_arc_transcriber_delegates() {
        let transcriber = Arc::new(MockTranscriber::new("shared").with_response("ok"));
        assert_eq!(transcriber.name(), "shared");
        let result = transcriber
            .transcribe(&[], &TranscribeOptions::new("fi"))
            .unwrap();
        assert_eq!(result.text, "ok");
    }
}
