//! Cleanup applied to chat text before it is spoken.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::types::KNOWN_VOICES;

struct SpeechPatterns {
    link: Regex,
    url: Regex,
    citation: Regex,
    markup: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static SpeechPatterns {
    static PATTERNS: OnceLock<SpeechPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SpeechPatterns {
        link: Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap(),
        url: Regex::new(r"https?://\S+").unwrap(),
        citation: Regex::new(r"\[\d+\]").unwrap(),
        markup: Regex::new(r"(?m)^#{1,6}\s+|[*_`~]+|^\s*[-+>]\s+").unwrap(),
        whitespace: Regex::new(r"\s+").unwrap(),
    })
}

/// Strip markdown, links and citation markers so the voice reads prose only.
///
/// Returns an empty string when nothing speakable is left.
pub fn prepare_for_speech(text: &str) -> String {
    let p = patterns();
    let text = p.link.replace_all(text, "$1");
    let text = p.url.replace_all(&text, "");
    let text = p.citation.replace_all(&text, "");
    let text = p.markup.replace_all(&text, "");
    let text = p.whitespace.replace_all(&text, " ");
    text.trim().to_string()
}

/// Use `requested` when it names a known voice, otherwise `default`.
pub fn resolve_voice(requested: Option<&str>, default: &str) -> String {
    let Some(voice) = requested.map(str::trim).filter(|v| !v.is_empty()) else {
        return default.to_string();
    };
    let lowered = voice.to_ascii_lowercase();
    if KNOWN_VOICES.contains(&lowered.as_str()) {
        lowered
    } else {
        warn!(voice, fallback = default, "Unknown voice requested");
        default.to_string()
    }
}
