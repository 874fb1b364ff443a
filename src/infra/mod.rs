// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Disk and logging concerns shared by the use cases:
//
//   checkpoint.rs      — resources.json (vocabularies + reader
//                        config) and CompactRecorder weights,
//                        enough to rebuild a reader for `ask`.
//
//   tokenizer_store.rs — word-level HuggingFace tokenizer used
//                        when questions are split into words;
//                        built once, then reloaded.
//
//   metrics.rs         — TrainingHook implementations: loss
//                        history, tracing progress, CSV rows.
//
// Reference: Burn Book §5 (Checkpointing)

/// Reader resources and weight persistence
pub mod checkpoint;

/// Tokenizer building, saving and loading
pub mod tokenizer_store;

/// Built-in training hooks
pub mod metrics;
