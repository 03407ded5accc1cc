//! External audio transcoding.

use crate::audio::wav::encode_wav;
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoxgateError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::process::Command;

/// Converts arbitrary containers into canonical 16 kHz mono 16-bit WAV.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Reject inputs that are not decodable audio.
    async fn probe(&self, input: &Path) -> Result<()>;

    /// Write the canonical WAV rendition of `input` to `output`.
    async fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}

/// `ffprobe` + `ffmpeg` run as child processes.
pub struct FfmpegTranscoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: &str, ffprobe: &str) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            ffprobe: ffprobe.to_string(),
        }
    }

    /// Arguments for the conversion, tolerant of truncated streaming chunks.
    pub fn convert_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-ar".to_string(),
            SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            "-fflags".to_string(),
            "+discardcorrupt+genpts+igndts".to_string(),
            "-err_detect".to_string(),
            "ignore_err".to_string(),
            output.display().to_string(),
        ]
    }
}

impl From<&crate::config::AudioConfig> for FfmpegTranscoder {
    fn from(config: &crate::config::AudioConfig) -> Self {
        Self::new(&config.ffmpeg, &config.ffprobe)
    }
}

async fn run(program: &str, args: &[String]) -> std::io::Result<std::process::Output> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
}

fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no diagnostic output")
        .trim()
        .to_string()
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe(&self, input: &Path) -> Result<()> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=format_name".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            input.display().to_string(),
        ];
        let output = run(&self.ffprobe, &args)
            .await
            .map_err(|e| VoxgateError::ConversionFailed {
                message: format!("failed to run {}: {e}", self.ffprobe),
            })?;
        if !output.status.success() {
            return Err(VoxgateError::CorruptAudio {
                message: last_line(&output.stderr),
            });
        }
        Ok(())
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let result = run(&self.ffmpeg, &Self::convert_args(input, output))
            .await
            .map_err(|e| VoxgateError::ConversionFailed {
                message: format!("failed to run {}: {e}", self.ffmpeg),
            })?;
        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        if stderr.contains("Invalid data found") {
            Err(VoxgateError::CorruptAudio {
                message: last_line(&result.stderr),
            })
        } else {
            Err(VoxgateError::ConversionFailed {
                message: last_line(&result.stderr),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MockMode {
    Decode,
    Corrupt,
    Fail,
}

/// Transcoder for tests: every input becomes a fixed PCM payload.
#[derive(Debug, Clone)]
pub struct MockTranscoder {
    mode: MockMode,
    samples: Vec<i16>,
    calls: Arc<AtomicUsize>,
}

impl MockTranscoder {
    /// Convert every input into `samples`.
    pub fn decoding(samples: Vec<i16>) -> Self {
        Self {
            mode: MockMode::Decode,
            samples,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every probe as corrupt.
    pub fn corrupt() -> Self {
        Self {
            mode: MockMode::Corrupt,
            ..Self::decoding(Vec::new())
        }
    }

    /// Probe fine, fail every conversion.
    pub fn failing() -> Self {
        Self {
            mode: MockMode::Fail,
            ..Self::decoding(Vec::new())
        }
    }

    /// Number of `convert` calls, shared across clones.
    pub fn conversions(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn probe(&self, input: &Path) -> Result<()> {
        if !input.exists() {
            return Err(VoxgateError::CorruptAudio {
                message: "input file missing".to_string(),
            });
        }
        match self.mode {
            MockMode::Corrupt => Err(VoxgateError::CorruptAudio {
                message: "Invalid data found when processing input".to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn convert(&self, _input: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.mode == MockMode::Fail {
            return Err(VoxgateError::ConversionFailed {
                message: "mock conversion failure".to_string(),
            });
        }
        tokio::fs::write(output, encode_wav(&self.samples, SAMPLE_RATE)?).await?;
        Ok(())
    }
}
