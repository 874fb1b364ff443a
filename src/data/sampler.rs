// ============================================================
// Layer 4 — Sampling: Negative Candidates & Train/Dev Split
// ============================================================
// Dynamic negative sampling shrinks a large candidate list to
// the true answer plus k distractors, drawn fresh every epoch:
//
//   candidates: [paris, lyon, berlin, rome, oslo]   answer: paris
//   k = 2     → [berlin, paris, oslo]               target: 1
//
// Distractors are drawn uniformly without replacement, then the
// answer is dropped into a uniformly random slot so the model
// cannot learn "the answer is always first".
//
// Uses rand::seq::index::sample (Floyd's algorithm) and
// SliceRandom's Fisher-Yates shuffle.
//
// Reference: rand crate documentation

use std::collections::BTreeSet;

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Where negatives come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NegativeSource {
    /// The example's own remaining candidates
    #[default]
    Candidates,
    /// Any id that appeared as a candidate during setup
    Vocabulary,
}

/// Replace `candidates` with the answer plus up to `how_many`
/// negatives. Returns the new list and the answer's new index.
///
/// `candidate_ids` is the pool for `NegativeSource::Vocabulary`:
/// every id ever seen in a candidate list, never question or
/// support tokens. When fewer than `how_many` distinct negatives
/// exist, all of them are used.
pub fn dynamic_subsample<R: Rng + ?Sized>(
    candidates:    &[u32],
    target:        usize,
    how_many:      usize,
    source:        NegativeSource,
    candidate_ids: &BTreeSet<u32>,
    rng:           &mut R,
) -> (Vec<u32>, usize) {
    let answer = candidates[target];

    let pool: Vec<u32> = match source {
        NegativeSource::Candidates => {
            // a repeated candidate string must not be drawn twice
            let mut seen = BTreeSet::new();
            candidates
                .iter()
                .copied()
                .filter(|&c| c != answer && seen.insert(c))
                .collect()
        }
        NegativeSource::Vocabulary => candidate_ids
            .iter()
            .copied()
            .filter(|&c| c != answer)
            .collect(),
    };

    let amount = how_many.min(pool.len());
    let mut sampled: Vec<u32> = index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i])
        .collect();

    let slot = rng.gen_range(0..=sampled.len());
    sampled.insert(slot, answer);
    (sampled, slot)
}

/// Randomly shuffle `samples` and split into (train, validation).
///
/// # Arguments
/// * `samples`        - All available samples (consumed by this function)
/// * `train_fraction` - Proportion for training, e.g. 0.8 = 80%
pub fn split_train_val<T, R: Rng + ?Sized>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    rng:            &mut R,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}
