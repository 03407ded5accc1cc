//! Synthesizers that run an external program writing a WAV file.

use crate::defaults;
use crate::error::{Result, VoxgateError};
use crate::tts::synthesizer::{AudioFormat, SynthesizedAudio, TextToSpeech, VoiceParams};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Run `program args...`, feed `text` on stdin, and read back `output`.
async fn run_to_wav(name: &str, program: &str, args: &[String], text: &str, output: &Path) -> Result<Vec<u8>> {
    let failed = |message: String| VoxgateError::InferenceFailed {
        engine: name.to_string(),
        message,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| failed(format!("failed to start {program}: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| failed(format!("failed to write text to {program}: {e}")))?;
    }

    let result = child
        .wait_with_output()
        .await
        .map_err(|e| failed(format!("{program} did not finish: {e}")))?;
    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(failed(format!(
            "{program} exited with {}: {}",
            result.status,
            stderr.trim()
        )));
    }

    let bytes = tokio::fs::read(output)
        .await
        .map_err(|e| failed(format!("no audio produced: {e}")))?;
    if bytes.is_empty() {
        return Err(failed("empty audio produced".to_string()));
    }
    Ok(bytes)
}

/// Neural voice synthesizer driven through a piper-compatible CLI.
pub struct NeuralSynth {
    command: String,
    model_path: PathBuf,
    name: String,
}

impl NeuralSynth {
    pub fn new(command: &str, model_path: PathBuf) -> Self {
        let name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("neural")
            .to_string();
        Self {
            command: command.to_string(),
            model_path,
            name,
        }
    }

    fn args(&self, params: &VoiceParams, output: &Path) -> Vec<String> {
        // Piper stretches phoneme length; a shorter length means faster speech.
        let length_scale = 1.0 / params.speed;
        vec![
            "--model".to_string(),
            self.model_path.display().to_string(),
            "--output_file".to_string(),
            output.display().to_string(),
            "--length_scale".to_string(),
            format!("{length_scale:.3}"),
        ]
    }
}

#[async_trait]
impl TextToSpeech for NeuralSynth {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<SynthesizedAudio> {
        let scratch = tempfile::TempDir::new()?;
        let output = scratch.path().join("speech.wav");
        let bytes = run_to_wav(&self.name, &self.command, &self.args(params, &output), text, &output).await?;
        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Wav,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Formant synthesizer driven through an espeak-ng-compatible CLI.
pub struct SystemSynth {
    command: String,
    voice: String,
}

impl SystemSynth {
    /// `voice` is the synthesizer's language voice, e.g. `fi` or `en-us`.
    pub fn new(command: &str, voice: &str) -> Self {
        Self {
            command: command.to_string(),
            voice: voice.to_string(),
        }
    }

    fn args(&self, params: &VoiceParams, output: &Path) -> Vec<String> {
        let variant = match params.voice.as_str() {
            "female" => "+f3",
            "male" => "+m3",
            _ => "",
        };
        let wpm = (defaults::SYSTEM_SYNTH_WPM as f32 * params.speed).round() as u32;
        vec![
            "-v".to_string(),
            format!("{}{variant}", self.voice),
            "-s".to_string(),
            wpm.to_string(),
            "-w".to_string(),
            output.display().to_string(),
            "--stdin".to_string(),
        ]
    }
}

#[async_trait]
impl TextToSpeech for SystemSynth {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<SynthesizedAudio> {
        let scratch = tempfile::TempDir::new()?;
        let output = scratch.path().join("speech.wav");
        let bytes = run_to_wav("system", &self.command, &self.args(params, &output), text, &output).await?;
        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Wav,
        })
    }

    fn name(&self) -> &str {
        "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(voice: &str, speed: f32) -> VoiceParams {
        VoiceParams {
            language: "en".to_string(),
            voice: voice.to_string(),
            speed,
        }
    }

    #[test]
    fn test_neural_args_scale_length_by_speed() {
        let synth = NeuralSynth::new("piper", PathBuf::from("/m/en_US-lessac-medium.onnx"));
        let args = synth.args(&params("neutral", 2.0), Path::new("/tmp/out.wav"));
        assert_eq!(synth.name(), "en_US-lessac-medium");
        assert_eq!(
            args,
            vec![
                "--model",
                "/m/en_US-lessac-medium.onnx",
                "--output_file",
                "/tmp/out.wav",
                "--length_scale",
                "0.500"
            ]
        );
    }

    #[test]
    fn test_system_args_voice_variant_and_rate() {
        let synth = SystemSynth::new("espeak-ng", "fi");
        let args = synth.args(&params("female", 0.5), Path::new("/tmp/o.wav"));
        assert_eq!(args[1], "fi+f3");
        assert_eq!(args[3], "88");

        let args = synth.args(&params("neutral", 1.0), Path::new("/tmp/o.wav"));
        assert_eq!(args[1], "fi");
        assert_eq!(args[3], "175");
    }

    #[tokio::test]
    async fn test_missing_program_is_inference_failure() {
        let synth = SystemSynth::new("/nonexistent/espeak-ng", "en");
        let err = synth
            .synthesize("hello", &params("neutral", 1.0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "inference_failed");
    }
}
