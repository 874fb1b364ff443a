// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, traits and the error taxonomy that every
// other layer speaks in.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Questions, candidate lists and predicted answers
pub mod qa_setting;

/// The reader's error taxonomy
pub mod error;

/// Collaborator seams: tokenizers, training hooks, answerers
pub mod traits;
