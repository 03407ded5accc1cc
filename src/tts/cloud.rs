//! Hosted synthesis endpoint, the last entry of every synthesis chain.

use crate::defaults;
use crate::error::{Result, VoxgateError};
use crate::tts::split_text;
use crate::tts::synthesizer::{AudioFormat, SynthesizedAudio, TextToSpeech, VoiceParams};
use async_trait::async_trait;
use reqwest::Url;

/// Synthesizer calling a translate_tts-style HTTP endpoint that answers MP3.
pub struct CloudSynth {
    client: reqwest::Client,
    endpoint: String,
}

impl CloudSynth {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    fn request_url(&self, text: &str, params: &VoiceParams) -> Result<Url> {
        let speed = format!("{:.2}", params.speed);
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("q", text),
                ("tl", params.language.as_str()),
                ("ttsspeed", speed.as_str()),
            ],
        )
        .map_err(|e| VoxgateError::ConfigInvalidValue {
            key: "tts.cloud_url".to_string(),
            message: e.to_string(),
        })
    }

    /// One request per piece of text the endpoint accepts.
    fn request_urls(&self, text: &str, params: &VoiceParams) -> Result<Vec<Url>> {
        split_text(text, defaults::CLOUD_SYNTH_MAX_CHARS)
            .iter()
            .map(|piece| self.request_url(piece, params))
            .collect()
    }

    async fn fetch(&self, url: Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failed(format!("endpoint returned status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.failed(format!("failed to read audio: {e}")))?;
        if bytes.is_empty() {
            return Err(self.failed("endpoint returned no audio".to_string()));
        }
        Ok(bytes.to_vec())
    }

    fn failed(&self, message: String) -> VoxgateError {
        VoxgateError::InferenceFailed {
            engine: "cloud".to_string(),
            message,
        }
    }
}

#[async_trait]
impl TextToSpeech for CloudSynth {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<SynthesizedAudio> {
        let urls = self.request_urls(text, params)?;
        if urls.len() > 1 {
            tracing::debug!(pieces = urls.len(), "splitting long text for cloud synthesis");
        }

        // MP3 frames are self-delimiting, so the pieces play back to back.
        let mut bytes = Vec::new();
        for url in urls {
            bytes.extend(self.fetch(url).await?);
        }
        if bytes.is_empty() {
            return Err(self.failed("no text to synthesize".to_string()));
        }

        Ok(SynthesizedAudio {
            bytes,
            format: AudioFormat::Mp3,
        })
    }

    fn name(&self) -> &str {
        "cloud"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_encodes_text_and_language() {
        let synth = CloudSynth::new("https://tts.example.com/translate_tts");
        let params = VoiceParams {
            language: "fi".to_string(),
            voice: "neutral".to_string(),
            speed: 1.0,
        };
        let url = synth.request_url("hyvää päivää & kiitos", &params).unwrap();
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("q".to_string(), "hyvää päivää & kiitos".to_string())));
        assert!(query.contains(&("tl".to_string(), "fi".to_string())));
        assert!(query.contains(&("ttsspeed".to_string(), "1.00".to_string())));
    }

    #[test]
    fn test_long_text_is_sent_in_pieces() {
        let synth = CloudSynth::new("https://tts.example.com/translate_tts");
        let sentence = "Tämä on melko pitkä suomenkielinen lause, jota käytetään testissä. ";
        let text = sentence.repeat(10);
        let urls = synth.request_urls(&text, &VoiceParams::new("fi")).unwrap();

        assert!(urls.len() > 1);
        let pieces: Vec<String> = urls
            .iter()
            .map(|url| {
                url.query_pairs()
                    .find(|(k, _)| k == "q")
                    .map(|(_, v)| v.into_owned())
                    .unwrap()
            })
            .collect();
        assert!(pieces.iter().all(|p| p.chars().count() <= defaults::CLOUD_SYNTH_MAX_CHARS));
        assert_eq!(pieces.join(" "), text.trim());
    }

    #[test]
    fn test_short_text_is_one_request() {
        let synth = CloudSynth::new("https://tts.example.com/translate_tts");
        let urls = synth.request_urls("kiitos", &VoiceParams::new("fi")).unwrap();
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let synth = CloudSynth::new("not a url");
        let err = synth
            .request_url("x", &VoiceParams::new("en"))
            .unwrap_err();
        assert_eq!(err.code(), "config_error");
    }
}
