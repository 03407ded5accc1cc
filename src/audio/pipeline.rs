//! Raw client audio in, canonical PCM out.

use crate::audio::transcoder::Transcoder;
use crate::audio::wav::{decode_pcm16, is_riff_wave};
use crate::error::{Result, VoxgateError};
use std::str::FromStr;
use std::sync::Arc;

/// What the client says its audio is. Only picks the scratch file extension;
/// the decoder decides from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceHint {
    Wav,
    #[default]
    Webm,
    Ogg,
    Mp3,
    Unknown,
}

impl SourceHint {
    pub fn extension(&self) -> &'static str {
        match self {
            SourceHint::Wav => "wav",
            SourceHint::Webm => "webm",
            SourceHint::Ogg => "ogg",
            SourceHint::Mp3 => "mp3",
            SourceHint::Unknown => "bin",
        }
    }
}

impl FromStr for SourceHint {
    type Err = std::convert::Infallible;

    /// Accepts bare formats (`wav`) and MIME types (`audio/webm;codecs=opus`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let essence = lowered.split(';').next().unwrap_or_default();
        let format = essence.rsplit('/').next().unwrap_or_default();
        Ok(match format {
            "wav" | "wave" | "x-wav" => SourceHint::Wav,
            "webm" => SourceHint::Webm,
            "ogg" | "opus" => SourceHint::Ogg,
            "mp3" | "mpeg" => SourceHint::Mp3,
            _ => SourceHint::Unknown,
        })
    }
}

/// Outcome of normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedAudio {
    /// 16 kHz mono 16-bit samples.
    Pcm(Vec<i16>),
    /// Too little input to hold speech; not an error.
    TooShort { bytes: usize },
}

pub struct AudioPipeline {
    transcoder: Arc<dyn Transcoder>,
    min_input_bytes: usize,
}

impl AudioPipeline {
    pub fn new(transcoder: Arc<dyn Transcoder>, min_input_bytes: usize) -> Self {
        Self {
            transcoder,
            min_input_bytes,
        }
    }

    /// Normalize one self-contained piece of audio.
    ///
    /// 16-bit PCM WAV is decoded in process; everything else is probed and
    /// converted through the transcoder inside a scratch directory that is
    /// removed however this returns.
    pub async fn normalize(&self, raw: &[u8], hint: SourceHint) -> Result<NormalizedAudio> {
        if raw.len() < self.min_input_bytes {
            return Ok(NormalizedAudio::TooShort { bytes: raw.len() });
        }

        if is_riff_wave(raw)
            && let Some(pcm) = decode_pcm16(raw)
        {
            tracing::debug!(samples = pcm.len(), "decoded WAV in process");
            return Ok(pcm_or_short(pcm, raw.len()));
        }

        let scratch = tempfile::TempDir::new()?;
        let input = scratch.path().join(format!("input.{}", hint.extension()));
        let output = scratch.path().join("output.wav");
        tokio::fs::write(&input, raw).await?;

        self.transcoder.probe(&input).await?;
        self.transcoder.convert(&input, &output).await?;

        let converted = tokio::fs::read(&output)
            .await
            .map_err(|e| VoxgateError::ConversionFailed {
                message: format!("converted audio missing: {e}"),
            })?;
        let pcm = decode_pcm16(&converted).ok_or_else(|| VoxgateError::ConversionFailed {
            message: "converted audio is not 16-bit PCM WAV".to_string(),
        })?;

        tracing::debug!(input_bytes = raw.len(), samples = pcm.len(), "audio normalized");
        Ok(pcm_or_short(pcm, raw.len()))
    }
}

fn pcm_or_short(pcm: Vec<i16>, bytes: usize) -> NormalizedAudio {
    if pcm.is_empty() {
        NormalizedAudio::TooShort { bytes }
    } else {
        NormalizedAudio::Pcm(pcm)
    }
}
