//! Language codes, per-language engine profiles and user-facing messages.

use crate::engine::{EngineBackend, PriorityHint};
use serde::{Deserialize, Serialize};

/// Reduce a language tag or name to its lowercase primary code.
///
/// `fi-FI`, `fi_FI` and `finnish` all become `fi`. Unknown names are
/// lowercased and passed through so that custom profiles still match.
pub fn canonicalize(code: &str) -> String {
    let lowered = code.trim().to_ascii_lowercase();
    let primary = lowered
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_string();
    match primary.as_str() {
        "english" => "en".to_string(),
        "finnish" | "suomi" => "fi".to_string(),
        "vietnamese" => "vi".to_string(),
        "" => crate::defaults::DEFAULT_LANGUAGE.to_string(),
        _ => primary,
    }
}

/// Languages with a built-in profile, with their English names.
pub const BUILTIN_LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("fi", "Finnish"), ("vi", "Vietnamese")];

/// English name of a canonical code, if it is a built-in language.
pub fn display_name(code: &str) -> Option<&'static str> {
    BUILTIN_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Variant choice for one transcriber backend, by priority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantPair {
    pub accuracy: String,
    pub speed: String,
}

impl VariantPair {
    pub fn new(accuracy: &str, speed: &str) -> Self {
        Self {
            accuracy: accuracy.to_string(),
            speed: speed.to_string(),
        }
    }

    pub fn pick(&self, priority: PriorityHint) -> &str {
        match priority {
            PriorityHint::Accuracy => &self.accuracy,
            PriorityHint::Speed => &self.speed,
        }
    }
}

/// Text shown to end users, per language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Messages {
    pub too_short: String,
    pub corrupt_audio: String,
    pub conversion_failed: String,
    pub could_not_understand: String,
    pub no_speech: String,
    pub engine_unavailable: String,
    pub transcription_failed: String,
    pub synthesis_failed: String,
}

impl Messages {
    pub fn english() -> Self {
        Self {
            too_short: "Audio file is too short.".to_string(),
            corrupt_audio: "Audio file is corrupted.".to_string(),
            conversion_failed: "Failed to convert audio.".to_string(),
            could_not_understand: "Could not understand the speech.".to_string(),
            no_speech: "No speech detected.".to_string(),
            engine_unavailable: "Speech recognition is currently unavailable.".to_string(),
            transcription_failed: "Transcription failed.".to_string(),
            synthesis_failed: "Speech synthesis failed.".to_string(),
        }
    }

    pub fn finnish() -> Self {
        Self {
            too_short: "Äänitiedosto on liian lyhyt.".to_string(),
            corrupt_audio: "Äänitiedosto on viallinen.".to_string(),
            conversion_failed: "Äänitiedoston muuntaminen epäonnistui.".to_string(),
            could_not_understand: "En saanut selvää puheesta.".to_string(),
            no_speech: "Puhetta ei havaittu.".to_string(),
            engine_unavailable: "Puheentunnistus ei ole juuri nyt käytettävissä.".to_string(),
            transcription_failed: "Puheentunnistus epäonnistui.".to_string(),
            synthesis_failed: "Puhesynteesi epäonnistui.".to_string(),
        }
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self::english()
    }
}

/// Engine order, variants and messages for one language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageProfile {
    /// Transcriber backends in preference order.
    pub stt: Vec<EngineBackend>,
    /// Synthesis backends in preference order. The configured fallback is
    /// appended when missing.
    pub tts: Vec<EngineBackend>,
    pub general: VariantPair,
    pub fast: VariantPair,
    /// Artifact variant of the language-specialized transcriber, if any.
    pub specialized: Option<String>,
    /// Artifact variant of the neural synthesis voice, if any.
    pub neural_voice: Option<String>,
    /// Voice name passed to the system synthesizer.
    pub system_voice: Option<String>,
    pub messages: Messages,
}

impl Default for LanguageProfile {
    fn default() -> Self {
        Self {
            stt: vec![
                EngineBackend::GeneralTranscriber,
                EngineBackend::FastTranscriber,
            ],
            tts: vec![EngineBackend::SystemSynth],
            general: VariantPair::new("small", "base"),
            fast: VariantPair::new("medium-q5_0", "small-q5_1"),
            specialized: None,
            neural_voice: None,
            system_voice: None,
            messages: Messages::english(),
        }
    }
}

impl LanguageProfile {
    /// Built-in profile for a canonical language code.
    pub fn builtin(language: &str) -> Self {
        match language {
            "en" => Self {
                tts: vec![EngineBackend::NeuralSynth, EngineBackend::SystemSynth],
                neural_voice: Some("en_US-lessac-medium".to_string()),
                system_voice: Some("en".to_string()),
                ..Self::default()
            },
            "fi" => Self {
                stt: vec![
                    EngineBackend::LanguageSpecialized,
                    EngineBackend::FastTranscriber,
                    EngineBackend::GeneralTranscriber,
                ],
                tts: vec![EngineBackend::NeuralSynth, EngineBackend::CloudSynth],
                general: VariantPair::new("medium", "small"),
                fast: VariantPair::new("medium-q5_0", "small-q5_1"),
                specialized: Some("fi-specialized".to_string()),
                neural_voice: Some("fi_FI-harri-medium".to_string()),
                system_voice: Some("fi".to_string()),
                messages: Messages::finnish(),
            },
            "vi" => Self {
                general: VariantPair::new("medium", "small"),
                system_voice: Some("vi".to_string()),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_region_tags() {
        assert_eq!(canonicalize("fi-FI"), "fi");
        assert_eq!(canonicalize("en_US"), "en");
        assert_eq!(canonicalize("  VI "), "vi");
    }

    #[test]
    fn test_canonicalize_names() {
        assert_eq!(canonicalize("Finnish"), "fi");
        assert_eq!(canonicalize("english"), "en");
        assert_eq!(canonicalize("vietnamese"), "vi");
    }

    #[test]
    fn test_canonicalize_unknown_passes_through() {
        assert_eq!(canonicalize("xx"), "xx");
        assert_eq!(canonicalize(""), "en");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("fi"), Some("Finnish"));
        assert_eq!(display_name(&canonicalize("en-GB")), Some("English"));
        assert_eq!(display_name("xx"), None);
    }

    #[test]
    fn test_variant_pair_pick() {
        let pair = VariantPair::new("medium", "small");
        assert_eq!(pair.pick(PriorityHint::Accuracy), "medium");
        assert_eq!(pair.pick(PriorityHint::Speed), "small");
    }

    #[test]
    fn test_finnish_profile_prefers_specialized() {
        let profile = LanguageProfile::builtin("fi");
        assert_eq!(profile.stt[0], EngineBackend::LanguageSpecialized);
        assert_eq!(profile.specialized.as_deref(), Some("fi-specialized"));
        assert_eq!(profile.messages.too_short, "Äänitiedosto on liian lyhyt.");
    }

    #[test]
    fn test_unknown_language_gets_default_profile() {
        assert_eq!(LanguageProfile::builtin("xx"), LanguageProfile::default());
    }

    #[test]
    fn test_partial_profile_toml_uses_defaults() {
        let profile: LanguageProfile = toml::from_str(
            r#"
            stt = ["fast_transcriber"]
            [messages]
            too_short = "Kort."
            "#,
        )
        .unwrap();
        assert_eq!(profile.stt, vec![EngineBackend::FastTranscriber]);
        assert_eq!(profile.messages.too_short, "Kort.");
        assert_eq!(
            profile.messages.corrupt_audio,
            Messages::english().corrupt_audio
        );
        assert_eq!(profile.general, VariantPair::new("small", "base"));
    }
}
