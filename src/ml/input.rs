// ============================================================
// Layer 5 — Input Modules
// ============================================================
// An InputModule turns raw QA examples into numeric batches:
//
//   setup_from_data    → build + freeze vocabularies (once)
//   dataset_generator  → lazy batch sequence for training / eval
//   batch_for          → one test-time batch for inference
//
// Vocabulary growth happens only in setup_from_data. Every other
// call maps through SharedResources::frozen_view().

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::batcher::{pad_ids, Array, Batch, BatchSequence, PortValue};
use crate::data::pipeline::{pipeline, Corpus, PipelineOptions, RawCorpus};
use crate::data::ports::{input, target, DataPort};
use crate::data::preprocessor::WhitespaceTokenizer;
use crate::data::vocab::VocabSet;
use crate::domain::error::{ReaderError, Result};
use crate::domain::qa_setting::{QaExample, QaSetting};
use crate::domain::traits::Tokenize;
use crate::ml::shared::{ReaderConfig, SharedResources};

pub trait InputModule {
    /// Ports populated in every batch
    fn output_ports(&self) -> Vec<DataPort>;

    /// Ports populated only when answers are available
    fn training_ports(&self) -> Vec<DataPort>;

    /// Build the vocabularies from the whole training set in growing
    /// mode, then freeze them.
    ///
    /// This is the only place vocabularies grow. Running it again on
    /// the same examples yields the same tokens.
    fn setup_from_data(&mut self, examples: &[QaExample], config: &ReaderConfig) -> Result<SharedResources>;

    /// Preprocess `examples` once and return a lazy, restartable
    /// sequence of padded batches.
    ///
    /// Training order is shuffled per call unless `is_eval`; negative
    /// sampling runs only when neither `is_eval` nor `test_time`.
    fn dataset_generator(
        &mut self,
        shared:    &SharedResources,
        examples:  &[QaExample],
        is_eval:   bool,
        test_time: bool,
    ) -> Result<BatchSequence>;

    /// One test-time batch covering every setting: no growth, no
    /// sampling, unseen tokens become UNK_ID.
    fn batch_for(&mut self, shared: &SharedResources, settings: &[QaSetting]) -> Result<Batch>;
}

// ─── Model F input ────────────────────────────────────────────────────────────
/// Atomic question + atomic candidates, with dynamic negative
/// sampling during training.
pub struct ModelFInputModule {
    rng:       StdRng,
    tokenizer: Box<dyn Tokenize>,
}

impl ModelFInputModule {
    /// Whitespace tokenizer, seeded shuffling and sampling
    pub fn new(seed: u64) -> Self {
        Self::with_tokenizer(seed, Box::new(WhitespaceTokenizer))
    }

    /// Use a custom tokenizer when `tokenization` is enabled
    pub fn with_tokenizer(seed: u64, tokenizer: Box<dyn Tokenize>) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), tokenizer }
    }

    fn options(config: &ReaderConfig) -> PipelineOptions {
        PipelineOptions {
            tokenization: config.tokenization,
            normalize:    config.normalize,
            ..PipelineOptions::default()
        }
    }
}

/// QUESTION, QUESTION_LENGTHS and ATOMIC_CANDIDATES, plus
/// TARGET_INDEX when known
pub(crate) fn model_f_layout(corpus: &Corpus, indices: &[usize]) -> Result<Batch> {
    let questions: Vec<Vec<u32>>  = indices.iter().map(|&i| corpus.question[i].clone()).collect();
    let candidates: Vec<Vec<u32>> = indices.iter().map(|&i| corpus.candidates[i].clone()).collect();
    let lengths: Vec<i64>         = indices.iter().map(|&i| corpus.question_lengths[i] as i64).collect();

    let mut batch = Batch::new();
    batch.insert(input::QUESTION, PortValue::Int(pad_ids(&questions)));
    batch.insert(input::QUESTION_LENGTHS, PortValue::Int(Array::vector(lengths)));
    batch.insert(input::ATOMIC_CANDIDATES, PortValue::Int(pad_ids(&candidates)));

    if let Some(targets) = &corpus.targets {
        let t: Vec<i64> = indices.iter().map(|&i| targets[i] as i64).collect();
        batch.insert(target::TARGET_INDEX, PortValue::Int(Array::vector(t)));
    }
    Ok(batch)
}

impl InputModule for ModelFInputModule {
    fn output_ports(&self) -> Vec<DataPort> {
        vec![input::QUESTION, input::QUESTION_LENGTHS, input::ATOMIC_CANDIDATES]
    }

    fn training_ports(&self) -> Vec<DataPort> {
        vec![target::TARGET_INDEX]
    }

    fn setup_from_data(&mut self, examples: &[QaExample], config: &ReaderConfig) -> Result<SharedResources> {
        let opts = PipelineOptions { negsamples: None, ..Self::options(config) };
        let raw  = RawCorpus::from_examples(examples, opts.single_support)?;
        let (_, vocabs) = pipeline(
            raw,
            VocabSet::growing(config.sepvocab),
            &opts,
            self.tokenizer.as_ref(),
            &mut self.rng,
        )?;

        let frozen = vocabs.into_frozen();
        tracing::info!(
            "Vocabulary ready: {} ids ({} target, {} candidate ids, {} distinct candidates)",
            frozen.vocab.len(),
            frozen.target.len(),
            frozen.candidate.len(),
            frozen.candidate_ids.len(),
        );
        Ok(SharedResources::from_frozen(frozen, config.clone()))
    }

    fn dataset_generator(
        &mut self,
        shared:    &SharedResources,
        examples:  &[QaExample],
        is_eval:   bool,
        test_time: bool,
    ) -> Result<BatchSequence> {
        let config = &shared.config;
        let sample = !is_eval && !test_time;
        let opts = PipelineOptions {
            test_time,
            negsamples: sample.then_some(config.negsamples),
            negative_source: config.negative_source,
            ..Self::options(config)
        };

        let raw = if test_time {
            RawCorpus::from_settings(examples.iter().map(|e| &e.setting), opts.single_support)
        } else {
            RawCorpus::from_examples(examples, opts.single_support)?
        };
        let (corpus, _) = pipeline(raw, shared.frozen_view(), &opts, self.tokenizer.as_ref(), &mut self.rng)?;

        let mut order: Vec<usize> = (0..corpus.len()).collect();
        if config.shuffle && !is_eval {
            order.shuffle(&mut self.rng);
        }
        Ok(BatchSequence::new(corpus, order, config.batch_size, model_f_layout))
    }

    fn batch_for(&mut self, shared: &SharedResources, settings: &[QaSetting]) -> Result<Batch> {
        let opts = PipelineOptions { test_time: true, ..Self::options(&shared.config) };
        let raw = RawCorpus::from_settings(settings, opts.single_support);
        let (corpus, _) = pipeline(raw, shared.frozen_view(), &opts, self.tokenizer.as_ref(), &mut self.rng)?;
        if corpus.len() != settings.len() {
            return Err(ReaderError::shape(format!(
                "{} settings produced {} rows", settings.len(), corpus.len()
            )));
        }
        let all: Vec<usize> = (0..corpus.len()).collect();
        model_f_layout(&corpus, &all)
    }
}
