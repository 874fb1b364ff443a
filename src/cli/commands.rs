// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `ask`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::TrainConfig;
use crate::data::sampler::NegativeSource;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a Model F reader on a JSON file of labelled questions
    Train(TrainArgs),

    /// Answer a question using a trained checkpoint
    Ask(AskArgs),
}

/// Where negative candidates are drawn from
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum NegativesArg {
    /// The example's own candidate list
    Candidates,
    /// The whole candidate vocabulary
    Vocabulary,
}

impl From<NegativesArg> for NegativeSource {
    fn from(a: NegativesArg) -> Self {
        match a {
            NegativesArg::Candidates => NegativeSource::Candidates,
            NegativesArg::Vocabulary => NegativeSource::Vocabulary,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON array of {question, support, candidates, answers}
    #[arg(long, default_value = "data/train.json")]
    pub data_file: String,

    /// Directory for resources, weights, tokenizer and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-2)]
    pub lr: f64,

    /// Squared-L2 weight penalty
    #[arg(long, default_value_t = 0.0)]
    pub l2: f64,

    /// Clip every gradient element to [-v, v]
    #[arg(long)]
    pub clip_value: Option<f32>,

    /// Rescale each gradient tensor to at most this L2 norm
    #[arg(long, conflicts_with = "clip_value")]
    pub clip_norm: Option<f32>,

    /// Embedding width
    #[arg(long, default_value_t = 10)]
    pub repr_dim: usize,

    /// Negative candidates sampled per training example
    #[arg(long, default_value_t = 1)]
    pub negsamples: usize,

    #[arg(long, value_enum, default_value = "candidates")]
    pub negatives: NegativesArg,

    /// Fraction of examples held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Split questions into words (default: each question is one symbol)
    #[arg(long)]
    pub tokenize: bool,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_file:       a.data_file,
            checkpoint_dir:  a.checkpoint_dir,
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            lr:              a.lr,
            l2:              a.l2,
            clip_value:      a.clip_value,
            clip_norm:       a.clip_norm,
            repr_dim:        a.repr_dim,
            negsamples:      a.negsamples,
            negative_source: a.negatives.into(),
            val_fraction:    a.val_fraction,
            seed:            a.seed,
            tokenization:    a.tokenize,
            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question, e.g. "capital_of France"
    #[arg(long, required_unless_present = "file")]
    pub question: Option<String>,

    /// Candidate answers, comma separated
    #[arg(long, value_delimiter = ',')]
    pub candidates: Vec<String>,

    /// Optional supporting passage
    #[arg(long)]
    pub support: Option<String>,

    /// Answer every question in a JSON file instead
    #[arg(long, conflicts_with = "question")]
    pub file: Option<String>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_to_config() {
        let cli = Cli::parse_from([
            "qa-reader", "train", "--epochs", "3", "--clip-value", "0.5", "--negatives", "vocabulary", "--tokenize",
        ]);
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.clip_value, Some(0.5));
        assert_eq!(cfg.negative_source, NegativeSource::Vocabulary);
        assert!(cfg.tokenization);
        assert_eq!(cfg.data_file, "data/train.json");
    }

    #[test]
    fn test_ask_candidates_are_split() {
        let cli = Cli::parse_from(["qa-reader", "ask", "--question", "capital_of France", "--candidates", "Paris,Lyon"]);
        let Commands::Ask(args) = cli.command else { panic!("expected ask") };
        assert_eq!(args.candidates, vec!["Paris", "Lyon"]);
    }

    #[test]
    fn test_ask_needs_question_or_file() {
        assert!(Cli::try_parse_from(["qa-reader", "ask"]).is_err());
    }
}
