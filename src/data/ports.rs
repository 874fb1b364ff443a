// ============================================================
// Layer 4 — Data Port Registry
// ============================================================
// A DataPort is a named, typed, shaped slot that one pipeline
// stage promises to fill and another stage reads from.
//
//   InputModule ──[QUESTION, QUESTION_LENGTHS, ATOMIC_CANDIDATES, TARGET_INDEX]──▶
//   ModelModule ──[CANDIDATE_SCORES]──▶ OutputModule
//               └─[LOSS]──▶ training loop
//
// Ports are plain const values: two ports are the same port when
// name, element type, shape and description all agree, so they
// can be used directly as HashMap keys. Module wiring is checked
// by set containment when the Reader is built, not at the first
// batch.

use std::collections::HashSet;

use crate::domain::error::{ReaderError, Result};

/// Element type carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Int,
    Float,
}

/// One axis of a port's shape signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    /// The batch axis, always first
    Batch,
    /// Padded to the longest entry in the batch
    Dynamic,
    Fixed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataPort {
    pub name:        &'static str,
    pub dtype:       ElementType,
    pub shape:       &'static [Dim],
    pub description: &'static str,
}

impl DataPort {
    pub const fn new(
        name:        &'static str,
        dtype:       ElementType,
        shape:       &'static [Dim],
        description: &'static str,
    ) -> Self {
        Self { name, dtype, shape, description }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Check a concrete shape against this port's signature
    pub fn check_shape(&self, shape: &[usize]) -> Result<()> {
        if shape.len() != self.rank() {
            return Err(ReaderError::shape(format!(
                "port '{}' expects rank {}, got shape {:?}",
                self.name, self.rank(), shape
            )));
        }
        for (axis, (dim, &actual)) in self.shape.iter().zip(shape).enumerate() {
            if let Dim::Fixed(expected) = dim {
                if *expected != actual {
                    return Err(ReaderError::shape(format!(
                        "port '{}' axis {} must be {}, got {}",
                        self.name, axis, expected, actual
                    )));
                }
            }
        }
        Ok(())
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────

pub mod input {
    use super::*;

    pub const QUESTION: DataPort = DataPort::new(
        "question", ElementType::Int, &[Dim::Batch, Dim::Dynamic],
        "question token ids, [batch_size, max_question_len]",
    );

    pub const QUESTION_LENGTHS: DataPort = DataPort::new(
        "question_lengths", ElementType::Int, &[Dim::Batch],
        "number of real (unpadded) question tokens, [batch_size]",
    );

    pub const ATOMIC_CANDIDATES: DataPort = DataPort::new(
        "atomic_candidates", ElementType::Int, &[Dim::Batch, Dim::Dynamic],
        "candidate ids, one id per candidate, [batch_size, max_num_candidates]",
    );

    pub const ANSWER_TO_QUESTION: DataPort = DataPort::new(
        "answer_to_question", ElementType::Int, &[Dim::Batch],
        "index of the question each answer belongs to, [num_answers]",
    );
}

pub mod target {
    use super::*;

    pub const TARGET_INDEX: DataPort = DataPort::new(
        "target_index", ElementType::Int, &[Dim::Batch],
        "position of the true answer in the candidate list, [batch_size]",
    );

    pub const ANSWER_SPAN: DataPort = DataPort::new(
        "answer_span", ElementType::Int, &[Dim::Batch, Dim::Fixed(2)],
        "inclusive (start, end) token span per answer, [num_answers, 2]",
    );
}

pub mod prediction {
    use super::*;

    pub const CANDIDATE_SCORES: DataPort = DataPort::new(
        "candidate_scores", ElementType::Float, &[Dim::Batch, Dim::Dynamic],
        "score per candidate, [batch_size, max_num_candidates]",
    );

    pub const START_SCORES: DataPort = DataPort::new(
        "start_scores", ElementType::Float, &[Dim::Batch, Dim::Dynamic],
        "span start logits per token, [batch_size, max_support_len]",
    );

    pub const END_SCORES: DataPort = DataPort::new(
        "end_scores", ElementType::Float, &[Dim::Batch, Dim::Dynamic],
        "span end logits per token, [batch_size, max_support_len]",
    );
}

pub const LOSS: DataPort = DataPort::new(
    "loss", ElementType::Float, &[Dim::Fixed(1)],
    "scalar training loss",
);

/// Fails with `DataContract` naming every port in `required`
/// that `provided` does not contain.
pub fn check_provided(provided: &[DataPort], required: &[DataPort]) -> Result<()> {
    let available: HashSet<&DataPort> = provided.iter().collect();
    let missing: Vec<&'static str> = required
        .iter()
        .filter(|p| !available.contains(p))
        .map(|p| p.name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReaderError::DataContract { missing })
    }
}
