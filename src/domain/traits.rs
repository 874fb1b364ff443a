// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams where external collaborators plug into the reader:
//
//   Tokenize          → text to ordered tokens
//                       (WhitespaceTokenizer, HfTokenizer)
//   TrainingHook      → observer called by the training loop
//                       (LossHistory, LoggingHook)
//   QuestionAnswerer  → anything that turns settings into answers
//                       (Reader)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::Result;
use crate::domain::qa_setting::{Answer, QaSetting};

// ─── Tokenize ─────────────────────────────────────────────────────────────────
/// Splits free text into an ordered sequence of tokens.
pub trait Tokenize {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

// ─── TrainingHook ─────────────────────────────────────────────────────────────
/// Observer invoked synchronously by the training loop, in
/// registration order. Returning an error aborts training and the
/// error reaches the caller unchanged.
pub trait TrainingHook {
    /// Called after every gradient step with the batch loss
    fn at_iteration_end(&mut self, epoch: usize, loss: f32) -> anyhow::Result<()>;

    /// Called once after the last batch of each epoch
    fn at_epoch_end(&mut self, epoch: usize) -> anyhow::Result<()>;
}

// ─── QuestionAnswerer ─────────────────────────────────────────────────────────
/// Any component that can answer a batch of questions.
pub trait QuestionAnswerer {
    fn answer(&mut self, settings: &[QaSetting]) -> Result<Vec<Answer>>;
}
