// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw QA examples to padded numeric batches.
// No tensors live here: batches are plain host arrays keyed by
// DataPort, and the ML layer binds them to burn tensors.
//
//   JsonLoader / QaDataset  → labelled examples
//       │
//       ▼
//   Preprocessor            → clean + lowercase + tokenize
//       │
//       ▼
//   pipeline (+ sampler)    → ids through Vocab, negative sampling
//       │
//       ▼
//   Batch / BatchSequence   → padded arrays keyed by DataPort
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Token ↔ id mapping with growing / frozen modes
pub mod vocab;

/// Text cleaning, casing normalisation, whitespace tokenizer
pub mod preprocessor;

/// Negative sampling and train/validation splitting
pub mod sampler;

/// The preprocessing pipeline: RawCorpus → Corpus
pub mod pipeline;

/// Typed data-port descriptors and wiring checks
pub mod ports;

/// Padded arrays, batches and the lazy batch sequence
pub mod batcher;

/// Burn Dataset container for labelled examples
pub mod dataset;

/// JSON example loading
pub mod loader;
