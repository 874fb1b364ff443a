// ============================================================
// Layer 4 — Example Loader
// ============================================================
// Reads labelled QA examples from a JSON file:
//
//   [
//     {
//       "question":   "capital_of France",
//       "support":    ["France is a country in Europe."],
//       "candidates": ["Paris", "Lyon", "Berlin"],
//       "answers":    ["Paris"]
//     },
//     ...
//   ]
//
// "answers" may be omitted for unlabelled (test-time) files.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};

use crate::data::dataset::QaDataset;
use crate::domain::qa_setting::{Answer, QaExample, QaSetting};
use crate::domain::traits::Tokenize;

/// Any component that can load QA examples from a source.
pub trait ExampleSource {
    fn load_all(&self) -> Result<QaDataset>;
}

/// On-disk record format
#[derive(Debug, Deserialize)]
struct RawRecord {
    question: String,
    #[serde(default)]
    support: Vec<String>,
    #[serde(default)]
    candidates: Vec<String>,
    #[serde(default)]
    answers: Vec<String>,
    #[serde(default)]
    id: Option<String>,
}

impl From<RawRecord> for QaExample {
    fn from(r: RawRecord) -> Self {
        let setting = QaSetting::new(r.question, r.support, r.candidates);
        let setting = match r.id {
            Some(id) => setting.with_id(id),
            None     => setting,
        };
        QaExample::new(setting, r.answers.into_iter().map(Answer::new).collect())
    }
}

pub struct JsonLoader {
    path: PathBuf,
}

impl JsonLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse examples from an in-memory JSON string
    pub fn parse(json: &str) -> Result<QaDataset> {
        let records: Vec<RawRecord> =
            serde_json::from_str(json).context("Malformed QA example JSON")?;
        Ok(QaDataset::new(records.into_iter().map(QaExample::from).collect()))
    }
}

impl ExampleSource for JsonLoader {
    fn load_all(&self) -> Result<QaDataset> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read '{}'", self.path.display()))?;
        let dataset = Self::parse(&json)
            .with_context(|| format!("While loading '{}'", self.path.display()))?;
        tracing::info!("Loaded {} examples from '{}'", dataset.examples().len(), self.path.display());
        Ok(dataset)
    }
}

/// All question and support text, e.g. for building a tokenizer vocabulary
pub fn corpus_texts(dataset: &QaDataset, tokenizer: &dyn Tokenize) -> Vec<String> {
    dataset
        .examples()
        .iter()
        .flat_map(|e| std::iter::once(&e.setting.question).chain(e.setting.support.iter()))
        .flat_map(|t| tokenizer.tokenize(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::WhitespaceTokenizer;

    const SAMPLE: &str = r#"[
        {"question": "capital_of France", "support": ["France is in Europe"],
         "candidates": ["Paris", "Lyon"], "answers": ["Paris"]},
        {"question": "capital_of Italy", "candidates": ["Rome", "Milan"], "id": "x2"}
    ]"#;

    #[test]
    fn test_parse_examples() {
        let ds = JsonLoader::parse(SAMPLE).unwrap();
        let ex = ds.examples();
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[0].answers[0].text, "Paris");
        assert_eq!(ex[0].setting.atomic_candidates, vec!["Paris", "Lyon"]);
        assert!(ex[1].answers.is_empty());
        assert_eq!(ex[1].setting.id.as_deref(), Some("x2"));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(JsonLoader::parse("{not json").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(JsonLoader::new("/definitely/not/here.json").load_all().is_err());
    }

    #[test]
    fn test_corpus_texts() {
        let ds = JsonLoader::parse(SAMPLE).unwrap();
        let words = corpus_texts(&ds, &WhitespaceTokenizer);
        assert!(words.contains(&"Europe".to_string()));
        assert!(words.contains(&"capital_of".to_string()));
    }
}
