// ============================================================
// Layer 5 — Shared Resources & Reader Configuration
// ============================================================
// SharedResources is everything the three modules must agree
// on: the frozen vocabularies and the reader configuration.
// It is built once by InputModule::setup_from_data and is
// read-only afterwards; the Reader keeps it behind an Arc.
//
// Serialised as JSON it is the reader's resource snapshot.

use serde::{Deserialize, Serialize};
use burn::prelude::*;

use crate::data::sampler::NegativeSource;
use crate::data::vocab::{FrozenVocabs, Vocab, VocabSet};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ReaderConfig {
    /// Embedding width
    #[config(default = 10)]
    pub repr_dim: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    /// Negatives drawn per training example
    #[config(default = 1)]
    pub negsamples: usize,
    #[config(default = "NegativeSource::Candidates")]
    pub negative_source: NegativeSource,
    #[config(default = 42)]
    pub seed: u64,
    /// Shuffle example order for training batches
    #[config(default = true)]
    pub shuffle: bool,
    /// Split questions into tokens (false: each question is one token)
    #[config(default = false)]
    pub tokenization: bool,
    /// Separate target / candidate vocabularies
    #[config(default = false)]
    pub sepvocab: bool,
    /// Lowercase and clean all text before mapping
    #[config(default = true)]
    pub normalize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedResources {
    pub vocab:           Vocab,
    pub target_vocab:    Vocab,
    pub candidate_vocab: Vocab,
    /// Sorted ids seen as candidates during setup; the pool for
    /// vocabulary-sourced negatives
    #[serde(default)]
    pub candidate_ids:   Vec<u32>,
    pub config:          ReaderConfig,
}

impl SharedResources {
    /// Resources with an empty candidate-id pool
    pub fn new(vocab: Vocab, target_vocab: Vocab, candidate_vocab: Vocab, config: ReaderConfig) -> Self {
        Self { vocab, target_vocab, candidate_vocab, candidate_ids: Vec::new(), config }
    }

    /// Resources straight out of setup
    pub fn from_frozen(frozen: FrozenVocabs, config: ReaderConfig) -> Self {
        Self {
            vocab:           frozen.vocab,
            target_vocab:    frozen.target,
            candidate_vocab: frozen.candidate,
            candidate_ids:   frozen.candidate_ids,
            config,
        }
    }

    /// Read-only vocabularies for the preprocessing pipeline.
    /// Borrowed vocabularies never grow.
    pub fn frozen_view(&self) -> VocabSet<&Vocab> {
        let view = if self.config.sepvocab {
            VocabSet::separate(&self.vocab, &self.target_vocab, &self.candidate_vocab)
        } else {
            VocabSet::shared(&self.vocab)
        };
        view.with_candidate_ids(self.candidate_ids.iter().copied())
    }

    /// Rows needed in an embedding table covering every id space
    pub fn num_ids(&self) -> usize {
        self.vocab
            .len()
            .max(self.target_vocab.len())
            .max(self.candidate_vocab.len())
    }
}
