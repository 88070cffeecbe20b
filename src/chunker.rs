//! Splits streamed reply text into speakable chunks.

/// Punctuation followed by a space; a chunk ends right after one of these.
const BREAK_PATTERNS: &[&str] = &[". ", "? ", "! ", ", ", "; ", ": "];

/// Default target chunk length in characters.
pub const DEFAULT_TARGET_CHARS: usize = 150;

/// Buffers text deltas and cuts them at natural boundaries.
///
/// Sizes are in characters. Once the buffer reaches the target size, a chunk
/// ends after the last punctuation break within 1.5x the target; failing
/// that, at the last whitespace at least 0.7x into the buffer; failing that,
/// at exactly the target size.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    buffer: String,
    target: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_CHARS)
    }
}

impl SentenceChunker {
    pub fn new(target: usize) -> Self {
        Self {
            buffer: String::new(),
            target: target.max(1),
        }
    }

    /// Text received but not yet finalized.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Append a delta and return every chunk it completes, in order.
    pub fn feed(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut chunks = Vec::new();
        while self.buffer.chars().count() >= self.target {
            let split = self.break_point();
            let rest = self.buffer.split_off(split);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }
        }
        chunks
    }

    /// Return whatever is left as the final chunk.
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    // Only called with at least `target` chars buffered, so the result is a
    // char boundary in 1..=buffer.len() and every pass makes progress.
    fn break_point(&self) -> usize {
        let window_end = byte_offset(&self.buffer, self.target * 3 / 2);
        let window = &self.buffer[..window_end];

        let punctuation = BREAK_PATTERNS
            .iter()
            .filter_map(|pattern| window.rfind(pattern).map(|at| at + pattern.len()))
            .max();
        if let Some(end) = punctuation {
            return end;
        }

        let min_whitespace = byte_offset(&self.buffer, self.target * 7 / 10);
        let whitespace = window
            .char_indices()
            .rev()
            .find(|(at, c)| c.is_whitespace() && *at >= min_whitespace)
            .map(|(at, _)| at);
        if let Some(at) = whitespace.filter(|at| *at > 0) {
            return at;
        }

        byte_offset(&self.buffer, self.target)
    }
}

/// Byte offset of the `chars`-th character, or the end of `s`.
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(at, _)| at)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn chunk_all(target: usize, deltas: &[&str]) -> Vec<String> {
        let mut chunker = SentenceChunker::new(target);
        let mut chunks: Vec<String> = deltas.iter().flat_map(|d| chunker.feed(d)).collect();
        chunks.extend(chunker.flush());
        chunks
    }

    fn without_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn breaks_after_sentence_punctuation() {
        let mut chunker = SentenceChunker::new(15);
        let chunks = chunker.feed("Hello world. This is great, right?");
        assert_eq!(chunks.first().map(String::as_str), Some("Hello world."));
        assert_eq!(chunks, vec!["Hello world.", "This is great,"]);
        assert_eq!(chunker.flush().as_deref(), Some("right?"));
    }

    #[test]
    fn short_reply_is_one_chunk_from_flush() {
        let mut chunker = SentenceChunker::new(150);
        for delta in ["Hi ", "there, ", "friend!"] {
            assert!(chunker.feed(delta).is_empty());
        }
        assert_eq!(chunker.flush().as_deref(), Some("Hi there, friend!"));
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn falls_back_to_whitespace_without_punctuation() {
        let mut chunker = SentenceChunker::new(20);
        let chunks = chunker.feed("alpha beta gamma delta epsilon zeta");
        assert_eq!(chunks, vec!["alpha beta gamma delta"]);
        assert_eq!(chunker.pending(), " epsilon zeta");
    }

    #[test]
    fn whitespace_too_early_forces_mid_word_break() {
        let mut chunker = SentenceChunker::new(10);
        let chunks = chunker.feed("ab abcdefghijklmnop");
        assert_eq!(chunks, vec!["ab abcdefg"]);
        assert_eq!(chunker.pending(), "hijklmnop");
    }

    #[test]
    fn unbroken_text_splits_at_target() {
        let chunks = chunk_all(5, &["abcdefghijkl"]);
        assert_eq!(chunks, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_char() {
        let chunks = chunk_all(4, &["ééééééé"]);
        assert_eq!(chunks.concat(), "ééééééé");
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn whitespace_only_flush_is_none() {
        let mut chunker = SentenceChunker::new(10);
        chunker.feed("   \n ");
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn chunking_is_lossless_modulo_boundary_whitespace() {
        let text = "Our refund policy covers purchases made within thirty days. \
            To start a refund, open the billing page: choose the order, then press refund! \
            Refunds usually arrive in five to seven business days; some banks take longer. \
            Is there anything else I can help with? Supercalifragilisticexpialidocious words \
            also survive, because nothing is ever dropped from the buffer";

        for target in [8, 25, 60, 150, 400] {
            let deltas: Vec<&str> = text
                .split_inclusive(|c: char| c == ' ' || c == ',')
                .collect();
            let chunks = chunk_all(target, &deltas);
            assert_eq!(
                without_whitespace(&chunks.concat()),
                without_whitespace(text),
                "target {target}"
            );
        }
    }

    #[test]
    fn chunks_respect_window_limit() {
        let text = "word ".repeat(200);
        let chunks = chunk_all(50, &[text.as_str()]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 75));
    }

    #[test]
    fn sizes_count_characters_not_bytes() {
        let mut chunker = SentenceChunker::new(150);
        assert!(chunker.feed(&"é".repeat(100)).is_empty());
        assert!(chunker.feed(&"é".repeat(49)).is_empty());

        let chunks = chunker.feed("éé");
        assert_eq!(chunks, vec!["é".repeat(150)]);
        assert_eq!(chunker.pending(), "é");
    }

    #[test]
    fn multibyte_windows_are_measured_in_characters() {
        let text = format!("{}. {}", "ü".repeat(100), "ü".repeat(60));
        let chunks = chunk_all(80, &[text.as_str()]);
        assert_eq!(chunks[0], format!("{}.", "ü".repeat(100)));
        assert!(chunks.iter().all(|c| c.chars().count() <= 120));
    }
}
