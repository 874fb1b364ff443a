#![recursion_limit = "256"]

// ============================================================
// qa-reader
// ============================================================
// A question-answering reader: raw questions with candidate
// answers go in, scored Answers come out.
//
//   Layer 1  cli          — clap commands
//   Layer 2  application  — train / ask workflows
//   Layer 3  domain       — plain types, traits, errors
//   Layer 4  data         — vocabulary, pipeline, ports, batches
//   Layer 5  ml           — burn models, losses, the Reader
//   Layer 6  infra        — checkpoints, tokenizer store, hooks

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
