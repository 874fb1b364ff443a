// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to a use case.
// All business logic lives in Layer 2 (application).
//
//   qa-reader train --data-file data/train.json --epochs 20
//   qa-reader ask --question "capital_of France" --candidates Paris,Lyon,Berlin
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{AskArgs, Commands, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "qa-reader",
    version,
    about = "Train a candidate-scoring QA reader on JSON data, then ask it questions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the use case; this layer only routes and prints.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Ask(args)   => run_ask(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.data_file);
    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete: {} training examples, {} held out.",
        report.train_examples, report.validation_examples
    );
    if let Some(loss) = report.final_loss {
        println!("Final epoch loss: {:.4}", loss);
    }
    if let Some(epoch) = report.best_epoch {
        println!("Lowest mean loss at epoch {}", epoch);
    }
    if let Some(acc) = report.validation_accuracy {
        println!("Validation accuracy: {:.1}%", acc * 100.0);
    }
    Ok(())
}

fn run_ask(args: AskArgs) -> Result<()> {
    use crate::application::ask_use_case::AskUseCase;

    let mut use_case = AskUseCase::new(&args.checkpoint_dir)?;

    if let Some(file) = &args.file {
        for (setting, answer) in use_case.answer_file(file)? {
            println!("{}\t{}\t{:.4}", setting.question, answer.text, answer.score.unwrap_or(f32::NAN));
        }
        return Ok(());
    }

    let question = args.question.unwrap_or_default();
    let support  = args.support.into_iter().collect();
    let answer   = use_case.answer(&question, support, args.candidates)?;
    match answer.score {
        Some(score) => println!("\nAnswer: {} (score {:.4})", answer.text, score),
        None        => println!("\nAnswer: {}", answer.text),
    }
    Ok(())
}
