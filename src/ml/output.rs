// ============================================================
// Layer 5 — Output Modules
// ============================================================
// Scores back to Answers. The output module sees the original
// QaSettings, so the answer text is the caller's candidate
// string exactly as supplied, not its normalised form.
//
//   candidates: ["Paris", "Lyon", "Berlin"]
//   scores:     [0.3,     0.3,    0.9, 0.0(pad)]
//   answer:     "Berlin" (0.9)
//
// Ties go to the earliest candidate.

use crate::data::batcher::Array;
use crate::data::ports::{prediction, DataPort};
use crate::domain::error::{ReaderError, Result};
use crate::domain::qa_setting::{Answer, QaSetting};

pub trait OutputModule {
    fn input_ports(&self) -> Vec<DataPort>;

    /// One Answer per input from its row of `candidate_scores`.
    ///
    /// Fails with BatchSizeMismatch when the score rows and inputs
    /// disagree in number.
    fn answer(&self, inputs: &[QaSetting], candidate_scores: &Array<f32>) -> Result<Vec<Answer>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelFOutputModule;

/// Index and value of the first maximum
fn first_argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best
}

impl OutputModule for ModelFOutputModule {
    fn input_ports(&self) -> Vec<DataPort> {
        vec![prediction::CANDIDATE_SCORES]
    }

    fn answer(&self, inputs: &[QaSetting], candidate_scores: &Array<f32>) -> Result<Vec<Answer>> {
        if candidate_scores.shape().len() != 2 {
            return Err(ReaderError::shape(format!(
                "candidate scores must be rank 2, got {:?}", candidate_scores.shape()
            )));
        }
        if inputs.len() != candidate_scores.batch_size() {
            return Err(ReaderError::BatchSizeMismatch {
                inputs: inputs.len(),
                scores: candidate_scores.batch_size(),
            });
        }

        inputs
            .iter()
            .enumerate()
            .map(|(i, setting)| {
                let row = candidate_scores
                    .row(i)
                    .ok_or_else(|| ReaderError::shape(format!("no score row {}", i)))?;
                let real = setting.num_candidates().min(row.len());
                Ok(match first_argmax(&row[..real]) {
                    Some((best, score)) => Answer::scored(setting.atomic_candidates[best].clone(), score),
                    None => Answer::new(""),
                })
            })
            .collect()
    }
}
