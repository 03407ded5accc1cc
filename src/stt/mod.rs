pub mod transcriber;
pub mod whisper;

pub use transcriber::{
    MockTranscriber, SpeechToText, TranscribeOptions, TranscriptSegment, Transcription,
};
pub use whisper::{WhisperConfig, WhisperEngine};
