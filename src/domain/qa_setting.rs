// ============================================================
// Layer 3 — QaSetting / Answer Domain Types
// ============================================================
// A QaSetting is one question instance:
//   - the question text
//   - one or more support passages
//   - an ordered list of atomic candidate answers
//
// An Answer is what the reader hands back: the winning candidate
// text, optionally a (start, end) token span, and a confidence.
//
// Example:
//   Question:   "capital_of France"
//   Candidates: ["Paris", "Lyon", "Berlin"]
//   Answer:     "Paris" (score 3.2)
//
// Reference: Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

/// One immutable question instance. Created by the caller,
/// never modified by the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaSetting {
    /// The natural language (or relation-style) question
    pub question: String,

    /// Supporting passages, in the order they were supplied
    #[serde(default)]
    pub support: Vec<String>,

    /// Atomic candidate answers. Each candidate is one unit,
    /// never split into tokens
    #[serde(default, alias = "candidates")]
    pub atomic_candidates: Vec<String>,

    /// Optional external identifier, kept for traceability
    #[serde(default)]
    pub id: Option<String>,
}

impl QaSetting {
    /// Create a new QaSetting.
    /// Uses impl Into<String> so callers can pass &str or String.
    pub fn new(
        question:   impl Into<String>,
        support:    Vec<String>,
        candidates: Vec<String>,
    ) -> Self {
        Self {
            question:          question.into(),
            support,
            atomic_candidates: candidates,
            id:                None,
        }
    }

    /// Attach an external id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Number of candidate answers for this question
    pub fn num_candidates(&self) -> usize {
        self.atomic_candidates.len()
    }
}

/// A predicted (or gold) answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// The answer text. For candidate scoring this is the
    /// original candidate string, untouched by normalisation
    pub text: String,

    /// Token span (start, end), inclusive, for extractive answers
    #[serde(default)]
    pub span: Option<(usize, usize)>,

    /// Confidence score assigned by the model, if any
    #[serde(default)]
    pub score: Option<f32>,
}

impl Answer {
    /// A gold answer with no span and no score
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), span: None, score: None }
    }

    /// A scored prediction
    pub fn scored(text: impl Into<String>, score: f32) -> Self {
        Self { text: text.into(), span: None, score: Some(score) }
    }

    /// Attach an inclusive token span
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some((start, end));
        self
    }

    /// Returns the length of the answer span in tokens
    pub fn span_length(&self) -> Option<usize> {
        self.span.map(|(s, e)| e.saturating_sub(s) + 1)
    }
}

/// One labelled training pair: a question plus its gold answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaExample {
    pub setting: QaSetting,
    pub answers: Vec<Answer>,
}

impl QaExample {
    pub fn new(setting: QaSetting, answers: Vec<Answer>) -> Self {
        Self { setting, answers }
    }
}
