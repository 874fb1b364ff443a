// ============================================================
// Layer 4 — QA Dataset
// ============================================================
// Holds labelled QaExamples and implements Burn's Dataset trait,
// so the same container can be indexed, iterated, or handed to
// burn's dataset transforms.

use burn::data::dataset::Dataset;

use crate::domain::qa_setting::{QaExample, QaSetting};

#[derive(Debug, Clone, Default)]
pub struct QaDataset {
    examples: Vec<QaExample>,
}

impl QaDataset {
    pub fn new(examples: Vec<QaExample>) -> Self {
        Self { examples }
    }

    pub fn examples(&self) -> &[QaExample] {
        &self.examples
    }

    pub fn into_examples(self) -> Vec<QaExample> {
        self.examples
    }

    /// The questions alone, for inference
    pub fn settings(&self) -> Vec<QaSetting> {
        self.examples.iter().map(|e| e.setting.clone()).collect()
    }
}

impl Dataset<QaExample> for QaDataset {
    fn get(&self, index: usize) -> Option<QaExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

impl From<Vec<QaExample>> for QaDataset {
    fn from(examples: Vec<QaExample>) -> Self {
        Self::new(examples)
    }
}
