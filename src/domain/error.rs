// ============================================================
// Layer 3 — Reader Error Taxonomy
// ============================================================
// Core modules return Result<T, ReaderError>. The application
// and CLI layers wrap these in anyhow with extra context.
//
// Propagation policy:
//   - Wiring and preprocessing errors are raised eagerly
//     (construction / setup time) and are fatal
//   - A malformed batch aborts the current training run; updates
//     applied for earlier batches stay in place
//   - Hook errors are passed through untouched
//
// Reference: Rust Book §9 (Error Handling)

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    /// The reader or one of its modules was configured inconsistently
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Declared ports cannot be satisfied by the upstream module
    #[error("data contract violated: missing ports {missing:?}")]
    DataContract { missing: Vec<&'static str> },

    /// Arrays in a batch (or a corpus) disagree in shape
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An example's true answer is absent from its own candidate list
    #[error("example {example}: answer '{answer}' is not among its candidates")]
    MissingAnswer { example: usize, answer: String },

    #[error("reader was not created for training")]
    NotTrainable,

    /// Output module received scores for a different number of questions
    #[error("batch size mismatch: {inputs} inputs but {scores} score rows")]
    BatchSizeMismatch { inputs: usize, scores: usize },

    /// Raised by a training hook
    #[error(transparent)]
    Hook(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ReaderError>;

impl ReaderError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_errors_are_transparent() {
        let err: ReaderError = anyhow::anyhow!("early stop").into();
        assert_eq!(err.to_string(), "early stop");
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = ReaderError::MissingAnswer { example: 3, answer: "paris".into() };
        assert_eq!(err.to_string(), "example 3: answer 'paris' is not among its candidates");
        let err = ReaderError::DataContract { missing: vec!["question"] };
        assert_eq!(err.to_string(), "data contract violated: missing ports [\"question\"]");
    }
}
