//! Transcript cleanup applied to every engine's output.

use crate::config::{Config, NormalizerConfig};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of cleaning one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTranscript {
    pub text: String,
    /// The raw text looked like noise and was replaced by the language's
    /// "could not understand" message.
    pub noise_rejected: bool,
}

pub struct TranscriptNormalizer {
    control_tokens: Vec<String>,
    deleted_tokens: Vec<String>,
    noise_alphabet: HashSet<char>,
    config: Arc<Config>,
}

impl TranscriptNormalizer {
    pub fn new(config: Arc<Config>) -> Self {
        let NormalizerConfig {
            control_tokens,
            deleted_tokens,
            noise_alphabet,
        } = config.normalizer.clone();
        Self {
            control_tokens: longest_first(control_tokens),
            deleted_tokens: longest_first(deleted_tokens),
            noise_alphabet: noise_alphabet.chars().collect(),
            config,
        }
    }

    /// Strip control tokens, collapse whitespace, and reject noise.
    pub fn clean(&self, raw: &str, language: &str) -> CleanedTranscript {
        let text = self.strip(raw);

        if self.is_noise(&text) {
            tracing::debug!(raw = %text, language, "transcript rejected as noise");
            return CleanedTranscript {
                text: self.config.messages(language).could_not_understand,
                noise_rejected: true,
            };
        }

        CleanedTranscript {
            text,
            noise_rejected: false,
        }
    }

    /// Remove control tokens and collapse whitespace, without the noise check.
    ///
    /// Deleted tokens go first, so `hyv<pad>ää` stays one word.
    pub fn strip(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        for token in &self.deleted_tokens {
            text = text.replace(token.as_str(), "");
        }
        for token in &self.control_tokens {
            text = text.replace(token.as_str(), " ");
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Every token is one character from the noise alphabet.
    fn is_noise(&self, text: &str) -> bool {
        !text.is_empty()
            && text.split_whitespace().all(|token| {
                let mut chars = token.chars();
                matches!((chars.next(), chars.next()), (Some(c), None) if self.noise_alphabet.contains(&c))
            })
    }
}

// Longest first so `</s>` is removed before `<s>` could split it.
fn longest_first(tokens: Vec<String>) -> Vec<String> {
    let mut tokens: Vec<String> = tokens.into_iter().filter(|t| !t.is_empty()).collect();
    tokens.sort_by_key(|t| std::cmp::Reverse(t.len()));
    tokens
}
