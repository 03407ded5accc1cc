//! In-process WAV handling for inputs that need no transcoder.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoxgateError};
use std::io::Cursor;

/// Whether `bytes` start with a RIFF/WAVE header.
pub fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode 16-bit integer PCM WAV into 16 kHz mono samples.
///
/// Returns `None` for anything else (other bit depths, float samples,
/// malformed headers) so the caller can hand it to the transcoder instead.
pub fn decode_pcm16(bytes: &[u8]) -> Option<Vec<i16>> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int || spec.channels == 0 {
        return None;
    }

    let raw: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .ok()?;

    let mono = downmix(&raw, spec.channels);
    Some(resample(&mono, spec.sample_rate, SAMPLE_RATE))
}

/// Average interleaved channels into one.
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

/// Encode mono 16-bit samples as a WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let encode_err = |e: hound::Error| VoxgateError::Other(format!("Failed to encode WAV: {e}"));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(encode_err)?;
    }
    writer.finalize().map_err(encode_err)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decode_16khz_mono_matches_exactly() {
        let input = vec![100i16, 200, 300, 400, 500];
        let wav = make_wav_data(16000, 1, &input);
        assert!(is_riff_wave(&wav));
        assert_eq!(decode_pcm16(&wav).unwrap(), input);
    }

    #[test]
    fn decode_stereo_downmixes_to_mono() {
        let wav = make_wav_data(16000, 2, &[100, 200, 300, 400, 500, 600]);
        assert_eq!(decode_pcm16(&wav).unwrap(), vec![150, 350, 550]);
    }

    #[test]
    fn decode_48khz_resamples_to_16khz() {
        let wav = make_wav_data(48000, 1, &vec![0i16; 48000]);
        let samples = decode_pcm16(&wav).unwrap();
        assert!(samples.len() >= 15900 && samples.len() <= 16100);
    }

    #[test]
    fn decode_44100hz_keeps_levels() {
        let wav = make_wav_data(44100, 1, &vec![1000i16; 44100]);
        let samples = decode_pcm16(&wav).unwrap();
        assert!(samples.len() >= 15900 && samples.len() <= 16100);
        assert!(samples.iter().all(|&s| (900..=1100).contains(&s)));
    }

    #[test]
    fn decode_rejects_float_wav() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();
        assert!(decode_pcm16(&cursor.into_inner()).is_none());
    }

    #[test]
    fn decode_rejects_non_wav() {
        assert!(decode_pcm16(b"\x1aE\xdf\xa3 webm header").is_none());
        assert!(!is_riff_wave(b"RIFF"));
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
        assert!(resample(&[], 8000, 16000).is_empty());
    }

    #[test]
    fn resample_upsamples_8khz() {
        let out = resample(&[0, 100, 200, 300], 8000, 16000);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 50);
    }

    #[test]
    fn encode_then_decode_preserves_samples() {
        let samples: Vec<i16> = (0..1600).map(|i| (i % 200) as i16 * 10).collect();
        let wav = encode_wav(&samples, 16000).unwrap();
        assert_eq!(decode_pcm16(&wav).unwrap(), samples);
    }
}
