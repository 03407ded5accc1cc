#[cfg(feature = "cloud-synth")]
pub mod cloud;
pub mod command;
pub mod synthesizer;

#[cfg(feature = "cloud-synth")]
pub use cloud::CloudSynth;
pub use command::{NeuralSynth, SystemSynth};
pub use synthesizer::{AudioFormat, MockSynthesizer, SynthesizedAudio, TextToSpeech, VoiceParams};

/// Map a requested voice onto the names engines understand.
///
/// Unknown voices fold into `neutral`.
pub fn normalize_voice(voice: Option<&str>) -> String {
    match voice.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("female" | "woman" | "zira") => "female".to_string(),
        Some("male" | "man") => "male".to_string(),
        _ => crate::defaults::DEFAULT_VOICE.to_string(),
    }
}

/// Clamp a requested speed into the supported range; missing means 1.0.
pub fn clamp_speed(speed: Option<f32>) -> f32 {
    match speed {
        Some(s) if s.is_finite() => s.clamp(crate::defaults::MIN_SPEED, crate::defaults::MAX_SPEED),
        _ => 1.0,
    }
}

/// Split text into pieces of at most `max_chars` characters.
///
/// Sentence ends (`.`, `!`, `?` followed by whitespace) are preferred cut
/// points, then word boundaries. A single word longer than the limit is cut
/// mid-word. Short sentences are packed together.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        if fits(&current, sentence, max_chars) {
            push_joined(&mut current, sentence);
            continue;
        }
        if !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if sentence.chars().count() <= max_chars {
            current.push_str(sentence);
            continue;
        }

        for word in sentence.split_whitespace() {
            if fits(&current, word, max_chars) {
                push_joined(&mut current, word);
                continue;
            }
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut slices = chars.chunks(max_chars).peekable();
            while let Some(slice) = slices.next() {
                let slice: String = slice.iter().collect();
                if slices.peek().is_some() {
                    pieces.push(slice);
                } else {
                    current = slice;
                }
            }
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text.trim();
    std::iter::from_fn(move || {
        let remaining = rest;
        if remaining.is_empty() {
            return None;
        }
        let mut chars = remaining.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?')
                && let Some(&(next, n)) = chars.peek()
                && n.is_whitespace()
            {
                rest = remaining[next..].trim_start();
                return Some(&remaining[..i + c.len_utf8()]);
            }
        }
        rest = "";
        Some(remaining)
    })
}

fn fits(current: &str, next: &str, max_chars: usize) -> bool {
    let joined = current.chars().count() + next.chars().count() + usize::from(!current.is_empty());
    joined <= max_chars
}

fn push_joined(current: &mut String, next: &str) {
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(next);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_voice_aliases() {
        assert_eq!(normalize_voice(Some("Female")), "female");
        assert_eq!(normalize_voice(Some("zira")), "female");
        assert_eq!(normalize_voice(Some("male")), "male");
        assert_eq!(normalize_voice(Some("robot")), "neutral");
        assert_eq!(normalize_voice(None), "neutral");
    }

    #[test]
    fn test_clamp_speed() {
        assert_eq!(clamp_speed(None), 1.0);
        assert_eq!(clamp_speed(Some(0.1)), 0.5);
        assert_eq!(clamp_speed(Some(3.0)), 2.0);
        assert_eq!(clamp_speed(Some(1.25)), 1.25);
        assert_eq!(clamp_speed(Some(f32::NAN)), 1.0);
    }

    #[test]
    fn test_split_text_short_text_is_one_piece() {
        assert_eq!(split_text("  Hei maailma.  ", 200), vec!["Hei maailma."]);
        assert!(split_text("   ", 200).is_empty());
    }

    #[test]
    fn test_split_text_prefers_sentence_ends() {
        let text = "First sentence here. Second one! Third?";
        assert_eq!(
            split_text(text, 25),
            vec!["First sentence here.", "Second one! Third?"]
        );
    }

    #[test]
    fn test_split_text_long_sentence_breaks_at_words() {
        let text = "one two three four five six seven eight nine ten";
        let pieces = split_text(text, 15);
        assert!(pieces.iter().all(|p| p.chars().count() <= 15), "{pieces:?}");
        assert_eq!(pieces.join(" "), text);
    }

    #[test]
    fn test_split_text_cuts_overlong_word() {
        let pieces = split_text("ääääääääää ok", 4);
        assert_eq!(pieces, vec!["ääää", "ääää", "ää", "ok"]);
    }

    #[test]
    fn test_split_text_keeps_decimal_points() {
        assert_eq!(split_text("Pi is 3.14 roughly.", 200), vec!["Pi is 3.14 roughly."]);
    }
}
