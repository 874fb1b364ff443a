// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads a HuggingFace word-level tokenizer,
// and adapts it to the reader's Tokenize trait.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. Instead the tokenizer JSON is written
// by hand and loaded with Tokenizer::from_file.
//
// The reader keeps its own Vocab, so only the token strings the
// HF tokenizer produces matter here, not its ids.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::data::preprocessor::WhitespaceTokenizer;
use crate::domain::traits::Tokenize;

const UNK: &str = "[UNK]";

// ─── HfTokenizer ──────────────────────────────────────────────────────────────
/// Tokenize adapter over a HuggingFace tokenizer
pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn new(inner: Tokenizer) -> Self {
        Self { inner }
    }
}

impl Tokenize for HfTokenizer {
    /// When the HF tokenizer cannot encode `text`, the text is split
    /// by `WhitespaceTokenizer` instead, so a question never turns
    /// into pure padding.
    fn tokenize(&self, text: &str) -> Vec<String> {
        match self.inner.encode(text, false) {
            Ok(enc) => enc.get_tokens().to_vec(),
            Err(e) => {
                tracing::error!("Tokenizer failed on {:?}, falling back to whitespace: {}", text, e);
                WhitespaceTokenizer.tokenize(text)
            }
        }
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load existing tokenizer or build a new one from texts
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    /// Load tokenizer.json from the store's directory.
    /// Fails if it was never built.
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Word-level vocabulary of the `vocab_size - 1` most frequent
    /// words (ties broken alphabetically), plus [UNK].
    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                let w = word.to_lowercase();
                let w = w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
                if !w.is_empty() {
                    *freq.entry(w.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(1));

        let mut vocab = serde_json::Map::new();
        vocab.insert(UNK.to_string(), serde_json::json!(0));
        for (id, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(id + 1));
        }

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0, "content": UNK, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!("Tokenizer built with {} words, saved to '{}'", words.len() + 1, path.display());

        Tokenizer::from_file(&path).map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("qa_reader_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_build_then_load() {
        let dir = temp_dir("tokenizer");
        let store = TokenizerStore::new(&dir);
        let texts = vec!["Paris is the capital of France".to_string(), "Paris is big".to_string()];

        let built = HfTokenizer::new(store.load_or_build(&texts, 100).unwrap());
        assert_eq!(built.tokenize("Paris is big"), vec!["paris", "is", "big"]);
        assert_eq!(built.tokenize("Berlin"), vec![UNK]);

        // second call reads the saved file
        let loaded = HfTokenizer::new(store.load_or_build(&[], 100).unwrap());
        assert_eq!(loaded.tokenize("capital of France"), vec!["capital", "of", "france"]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_encode_failure_falls_back_to_whitespace() {
        let dir = temp_dir("tokenizer_no_unk");
        std::fs::create_dir_all(&dir).unwrap();
        // word-level model whose unk token is not in its vocabulary
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": { "type": "WordLevel", "vocab": { "paris": 0 }, "unk_token": UNK }
        });
        std::fs::write(dir.join("tokenizer.json"), json.to_string()).unwrap();

        let tok = HfTokenizer::new(TokenizerStore::new(&dir).load().unwrap());
        assert_eq!(tok.tokenize("paris"), vec!["paris"]);
        assert_eq!(tok.tokenize("capital of Spain"), vec!["capital", "of", "Spain"]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_vocab_size_keeps_most_frequent() {
        let dir = temp_dir("tokenizer_small");
        let store = TokenizerStore::new(&dir);
        let texts = vec!["a a a b b c".to_string()];
        let tok = HfTokenizer::new(store.load_or_build(&texts, 3).unwrap());
        assert_eq!(tok.tokenize("a b c"), vec!["a", "b", UNK]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
