// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Load labelled examples      (Layer 4 - data)
//   Step 2: Split train/validation      (Layer 4 - data)
//   Step 3: Build tokenizer (optional)  (Layer 6 - infra)
//   Step 4: Build the reader            (Layer 5 - ml)
//   Step 5: Train with Adam + hooks     (Layer 5 / 6)
//   Step 6: Validation accuracy         (Layer 5 - ml)
//   Step 7: Save resources + weights    (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::optim::AdamConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::QaDataset,
    loader::{corpus_texts, ExampleSource, JsonLoader},
    preprocessor::WhitespaceTokenizer,
    sampler::{split_train_val, NegativeSource},
};
use crate::domain::traits::TrainingHook;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{LoggingHook, LossHistory, MetricsLogger},
    tokenizer_store::{HfTokenizer, TokenizerStore},
};
use crate::ml::{
    input::ModelFInputModule,
    output::ModelFOutputModule,
    reader::{ModelFReader, Reader},
    shared::ReaderConfig,
    trainer::{ClipPolicy, TrainOptions},
};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_file:       String,
    pub checkpoint_dir:  String,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub lr:              f64,
    pub l2:              f64,
    /// Elementwise clip to [-clip_value, clip_value]
    pub clip_value:      Option<f32>,
    /// Per-tensor L2-norm clip (ignored when clip_value is set)
    pub clip_norm:       Option<f32>,
    pub repr_dim:        usize,
    pub negsamples:      usize,
    pub negative_source: NegativeSource,
    pub val_fraction:    f64,
    pub seed:            u64,
    /// Split questions into words with a word-level tokenizer
    pub tokenization:    bool,
    pub tokenizer_vocab: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_file:       "data/train.json".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            epochs:          20,
            batch_size:      32,
            lr:              1e-2,
            l2:              0.0,
            clip_value:      None,
            clip_norm:       None,
            repr_dim:        10,
            negsamples:      1,
            negative_source: NegativeSource::Candidates,
            val_fraction:    0.1,
            seed:            42,
            tokenization:    false,
            tokenizer_vocab: 30000,
        }
    }
}

impl TrainConfig {
    /// Settings the reader itself keeps in its resources
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::new()
            .with_repr_dim(self.repr_dim)
            .with_batch_size(self.batch_size)
            .with_negsamples(self.negsamples)
            .with_negative_source(self.negative_source)
            .with_seed(self.seed)
            .with_tokenization(self.tokenization)
    }

    /// Per-run loop options. `clip_value` wins over `clip_norm` when
    /// both are set.
    pub fn train_options(&self) -> TrainOptions {
        let clip = match (self.clip_value, self.clip_norm) {
            (Some(v), _)    => Some(ClipPolicy::Value { min: -v.abs(), max: v.abs() }),
            (None, Some(n)) => Some(ClipPolicy::Norm(n)),
            (None, None)    => None,
        };
        TrainOptions { max_epochs: self.epochs, lr: self.lr, l2: self.l2, clip }
    }
}

/// What a finished run reports back to the CLI
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub train_examples:      usize,
    pub validation_examples: usize,
    pub final_loss:          Option<f64>,
    /// Epoch with the lowest mean loss
    pub best_epoch:          Option<usize>,
    pub validation_accuracy: Option<f64>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline. Resources and weights are written only
    /// after training succeeds.
    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Load labelled examples ───────────────────────────────────
        let dataset = JsonLoader::new(&cfg.data_file).load_all()?;

        // ── Step 2: Train / validation split ─────────────────────────────────
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let (train, val) = split_train_val(dataset.into_examples(), 1.0 - cfg.val_fraction, &mut rng);
        tracing::info!("Split: {} train, {} validation", train.len(), val.len());
        let train = QaDataset::new(train);
        let val   = QaDataset::new(val);

        // ── Step 3: Tokenizer ────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let input = if cfg.tokenization {
            let texts = corpus_texts(&train, &WhitespaceTokenizer);
            let tokenizer = TokenizerStore::new(ckpt.dir()).load_or_build(&texts, cfg.tokenizer_vocab)?;
            ModelFInputModule::with_tokenizer(cfg.seed, Box::new(HfTokenizer::new(tokenizer)))
        } else {
            ModelFInputModule::new(cfg.seed)
        };

        // ── Step 4: Reader ───────────────────────────────────────────────────
        let device = Default::default();
        let mut reader: ModelFReader<TrainBackend> =
            Reader::new(input, ModelFOutputModule, cfg.reader_config(), true, device)?;

        // ── Step 5: Train ────────────────────────────────────────────────────
        let mut optim   = AdamConfig::new().with_epsilon(1e-8).init();
        let mut history = LossHistory::new();
        let mut logging = LoggingHook::new(50, cfg.epochs);
        let mut csv     = MetricsLogger::new(ckpt.dir())?;
        {
            let mut hooks: [&mut dyn TrainingHook; 3] = [&mut history, &mut logging, &mut csv];
            reader
                .train(&mut optim, train.examples(), &cfg.train_options(), &mut hooks)
                .context("Training failed")?;
        }

        // ── Step 6: Validation accuracy ──────────────────────────────────────
        let validation_accuracy = if val.examples().is_empty() {
            None
        } else {
            let answers = reader.answer(&val.settings())?;
            let correct = answers
                .iter()
                .zip(val.examples())
                .filter(|(a, e)| e.answers.iter().any(|g| g.text == a.text))
                .count();
            let acc = correct as f64 / val.examples().len() as f64;
            tracing::info!("Validation accuracy: {:.1}% ({}/{})", acc * 100.0, correct, val.examples().len());
            Some(acc)
        };

        // ── Step 7: Save ─────────────────────────────────────────────────────
        let shared = reader.shared_resources().context("Reader has no resources after training")?;
        let model  = reader.model().context("Reader has no model after training")?;
        ckpt.save_resources(shared)?;
        ckpt.save_model::<TrainBackend, _>(model, cfg.epochs)?;
        tracing::info!("Checkpoint saved to '{}'", ckpt.dir().display());

        Ok(TrainReport {
            train_examples: train.examples().len(),
            validation_examples: val.examples().len(),
            final_loss: history.epochs().last().map(|m| m.mean_loss),
            best_epoch: history.best().map(|m| m.epoch),
            validation_accuracy,
        })
    }
}
