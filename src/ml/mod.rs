// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// The data and domain layers never import burn tensors; batches
// cross into this layer as host arrays keyed by DataPort.
//
//   binding.rs  — host arrays ↔ burn tensors, PortTensors
//   shared.rs   — SharedResources + ReaderConfig
//   input.rs    — InputModule trait, Model F input
//   model.rs    — ModelModule trait, Model F bilinear scorer
//   xqa.rs      — span-extraction min-over-answers loss
//   output.rs   — OutputModule trait, argmax answer selection
//   trainer.rs  — l2 penalty, gradient clipping, TrainOptions
//   reader.rs   — the Reader: wiring, training loop, inference
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Host array ↔ tensor conversion
pub mod binding;

/// Frozen vocabularies and reader hyperparameters
pub mod shared;

/// Raw examples → batches
pub mod input;

/// Batches → scores and loss
pub mod model;

/// Span-extraction loss with segment minimum
pub mod xqa;

/// Scores → answers
pub mod output;

/// Regularisation and gradient clipping
pub mod trainer;

/// Orchestration and the training loop
pub mod reader;
