//! Wire frames of the streaming channel.
//!
//! Clients send one optional JSON config frame, then binary audio chunks.
//! The server answers with JSON status frames.

use crate::audio::SourceHint;
use crate::stt::TranscriptSegment;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Optional first text frame of a session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub language: Option<String>,
    /// Accepts a number or a numeric string; anything else is ignored.
    #[serde(
        rename = "chunkSizeLimit",
        alias = "chunkSize",
        alias = "chunk_size_limit",
        deserialize_with = "lenient_u32"
    )]
    pub chunk_size_limit: Option<u32>,
    /// Container of the chunks, as a format name or MIME type.
    #[serde(alias = "mimeType")]
    pub format: Option<String>,
    /// `speed` or `accuracy`.
    pub priority: Option<String>,
}

impl ClientConfig {
    /// Parse a config frame; `None` when it is not a JSON object we understand.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn source_hint(&self) -> Option<SourceHint> {
        self.format.as_deref().and_then(|f| f.parse().ok())
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let number = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(number.and_then(|n| u32::try_from(n).ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    ChunkReceived,
    NeedMoreAudio,
    Success,
    NoSpeechDetected,
    InvalidAudioData,
    Error,
}

/// A JSON frame sent to the client. Absent fields are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub status: FrameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<TranscriptSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerFrame {
    fn bare(status: FrameStatus) -> Self {
        Self {
            status,
            size: None,
            text: None,
            segments: None,
            engine: None,
            is_final: None,
            language: None,
            message: None,
            error: None,
        }
    }

    pub fn chunk_received(size: usize) -> Self {
        Self {
            size: Some(size),
            ..Self::bare(FrameStatus::ChunkReceived)
        }
    }

    pub fn need_more_audio() -> Self {
        Self::bare(FrameStatus::NeedMoreAudio)
    }

    pub fn success(text: String, segments: Vec<TranscriptSegment>, engine: String, language: &str) -> Self {
        Self {
            text: Some(text),
            segments: Some(segments),
            engine: Some(engine),
            is_final: Some(false),
            language: Some(language.to_string()),
            ..Self::bare(FrameStatus::Success)
        }
    }

    /// `message` is set when the transcript was rejected as noise.
    pub fn no_speech_detected(message: Option<String>) -> Self {
        Self {
            message,
            ..Self::bare(FrameStatus::NoSpeechDetected)
        }
    }

    pub fn invalid_audio_data(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::bare(FrameStatus::InvalidAudioData)
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            text: Some(String::new()),
            error: Some(code.to_string()),
            message: Some(message.to_string()),
            ..Self::bare(FrameStatus::Error)
        }
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"error"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn as_value(frame: &ServerFrame) -> Value {
        serde_json::from_str(&frame.to_json()).unwrap()
    }

    #[test]
    fn test_client_config_camel_case() {
        let config = ClientConfig::parse(r#"{"language":"fi","chunkSizeLimit":20000}"#).unwrap();
        assert_eq!(config.language.as_deref(), Some("fi"));
        assert_eq!(config.chunk_size_limit, Some(20000));
    }

    #[test]
    fn test_client_config_aliases() {
        let config = ClientConfig::parse(r#"{"chunkSize":1234,"mimeType":"audio/ogg;codecs=opus"}"#).unwrap();
        assert_eq!(config.chunk_size_limit, Some(1234));
        assert_eq!(config.source_hint(), Some(SourceHint::Ogg));
        assert_eq!(config.language, None);
    }

    #[test]
    fn test_client_config_rejects_garbage() {
        assert!(ClientConfig::parse("not json").is_none());
        assert!(ClientConfig::parse("[1, 2]").is_none());
        assert_eq!(ClientConfig::parse("{}"), Some(ClientConfig::default()));
    }

    #[test]
    fn test_chunk_limit_as_numeric_string() {
        let config = ClientConfig::parse(r#"{"language":"fi","chunkSizeLimit":"20000"}"#).unwrap();
        assert_eq!(config.chunk_size_limit, Some(20000));
        assert_eq!(config.language.as_deref(), Some("fi"));

        let config = ClientConfig::parse(r#"{"chunkSize":" 1500 "}"#).unwrap();
        assert_eq!(config.chunk_size_limit, Some(1500));
    }

    #[test]
    fn test_unusable_chunk_limit_keeps_language() {
        for limit in [r#""big""#, "-5", "12.5", "null", "true", "99999999999"] {
            let text = format!(r#"{{"language":"sv","chunkSizeLimit":{limit}}}"#);
            let config = ClientConfig::parse(&text).unwrap();
            assert_eq!(config.chunk_size_limit, None, "{limit}");
            assert_eq!(config.language.as_deref(), Some("sv"), "{limit}");
        }
    }

    #[test]
    fn test_chunk_received_shape() {
        assert_eq!(
            as_value(&ServerFrame::chunk_received(30000)),
            json!({"status": "chunk_received", "size": 30000})
        );
    }

    #[test]
    fn test_bare_status_frames() {
        assert_eq!(
            as_value(&ServerFrame::need_more_audio()),
            json!({"status": "need_more_audio"})
        );
        assert_eq!(
            as_value(&ServerFrame::no_speech_detected(None)),
            json!({"status": "no_speech_detected"})
        );
    }

    #[test]
    fn test_success_shape() {
        let frame = ServerFrame::success(
            "hello world".to_string(),
            vec![TranscriptSegment::new("hello world", 0.0, 1.5)],
            "general_transcriber/small/en".to_string(),
            "en",
        );
        assert_eq!(
            as_value(&frame),
            json!({
                "status": "success",
                "text": "hello world",
                "segments": [{"text": "hello world", "start": 0.0, "end": 1.5}],
                "engine": "general_transcriber/small/en",
                "is_final": false,
                "language": "en"
            })
        );
    }

    #[test]
    fn test_error_shape() {
        let value = as_value(&ServerFrame::error("inference_failed", "Transcription failed."));
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "inference_failed");
        assert_eq!(value["text"], "");
    }

    #[test]
    fn test_frame_parses_back() {
        let frame = ServerFrame::invalid_audio_data("bad audio");
        let parsed: ServerFrame = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(parsed, frame);
    }
}
