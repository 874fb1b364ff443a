// ============================================================
// Layer 4 — Text Preprocessor & Default Tokenizer
// ============================================================
// Everything that happens to raw text before it meets the
// vocabulary:
//
//   clean()      → collapse whitespace, drop control characters
//   normalize()  → casing canonicalisation (lowercase)
//   tokenize()   → split into tokens (WhitespaceTokenizer)
//
// Questions copied from knowledge-base dumps often carry tabs,
// non-breaking spaces and stray control bytes; left alone they
// become distinct vocabulary entries for what is the same word.
//
// Reference: Rust Book §8 (Strings in Rust)
//            Rust Book §13 (Iterators)

use crate::domain::traits::Tokenize;

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    lowercase: bool,
}

impl Preprocessor {
    pub fn new(lowercase: bool) -> Self {
        Self { lowercase }
    }

    /// Clean a raw text string: unify whitespace variants, remove
    /// control characters, collapse runs of spaces, trim.
    pub fn clean(&self, text: &str) -> String {
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;

        for c in text.chars() {
            let c = match c {
                '\t' | '\r' | '\n' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }

    /// Clean, then canonicalise casing when enabled
    pub fn normalize(&self, text: &str) -> String {
        let cleaned = self.clean(text);
        if self.lowercase {
            cleaned.to_lowercase()
        } else {
            cleaned
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(true)
    }
}

// ─── WhitespaceTokenizer ──────────────────────────────────────────────────────
/// Splits on whitespace and peels punctuation off token edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenize for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new(false);
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new(false);
        assert_eq!(p.clean("  hello world  "), "hello world");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new(false);
        assert_eq!(p.clean("hello\x01world"), "hello world");
        assert_eq!(p.clean("a\u{00A0}\tb"), "a b");
    }

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(Preprocessor::new(true).normalize(" Paris  France"), "paris france");
        assert_eq!(Preprocessor::new(false).normalize("Paris"), "Paris");
    }

    #[test]
    fn test_whitespace_tokenizer_strips_punctuation() {
        let toks = WhitespaceTokenizer.tokenize("Where is (Paris)? born_in");
        assert_eq!(toks, vec!["Where", "is", "Paris", "born_in"]);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(Preprocessor::default().clean(""), "");
        assert!(WhitespaceTokenizer.tokenize("  ").is_empty());
    }
}
