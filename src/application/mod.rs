// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: load data, build a reader, train
// or answer, persist. No tensor code and no printing here.
//
// Errors cross this layer as anyhow::Error with context added;
// the core's ReaderError converts automatically through `?`.

/// Load → split → train → evaluate → save
pub mod train_use_case;

/// Restore a checkpoint and answer questions
pub mod ask_use_case;
