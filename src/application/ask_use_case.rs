// ============================================================
// Layer 2 — Ask Use Case
// ============================================================
// Rebuilds a trained reader from a checkpoint directory and
// answers questions with it:
//
//   1. resources.json     → frozen vocabularies + ReaderConfig
//   2. tokenizer.json     → only when the reader tokenizes questions
//   3. model_epoch_N      → Model F weights
//   4. Reader::from_parts → ready to answer, not trainable

use anyhow::{Context, Result};

use crate::application::train_use_case::TrainBackend;
use crate::data::loader::{ExampleSource, JsonLoader};
use crate::domain::qa_setting::{Answer, QaSetting};
use crate::domain::traits::QuestionAnswerer;
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::{HfTokenizer, TokenizerStore},
};
use crate::ml::{
    input::ModelFInputModule,
    model::{ModelF, ModelModule},
    output::ModelFOutputModule,
    reader::{ModelFReader, Reader},
};

pub struct AskUseCase {
    reader: ModelFReader<TrainBackend>,
}

impl AskUseCase {
    /// Restore a reader saved by `train`.
    ///
    /// Fails if resources.json or the weights are missing, or if the
    /// saved weights do not fit the saved vocabulary.
    pub fn new(checkpoint_dir: &str) -> Result<Self> {
        let ckpt   = CheckpointManager::new(checkpoint_dir)?;
        let shared = ckpt.load_resources()?;
        let device = Default::default();

        let input = if shared.config.tokenization {
            let tokenizer = TokenizerStore::new(ckpt.dir()).load()?;
            ModelFInputModule::with_tokenizer(shared.config.seed, Box::new(HfTokenizer::new(tokenizer)))
        } else {
            ModelFInputModule::new(shared.config.seed)
        };

        let skeleton = ModelF::<TrainBackend>::build(&shared, &device)?;
        let model    = ckpt.load_model::<TrainBackend, _>(skeleton, &device)?;

        let reader = Reader::from_parts(input, ModelFOutputModule, shared, model, device)?;
        Ok(Self { reader })
    }

    /// Best candidate for one question
    pub fn answer(&mut self, question: &str, support: Vec<String>, candidates: Vec<String>) -> Result<Answer> {
        if candidates.is_empty() {
            anyhow::bail!("At least one candidate answer is required");
        }
        let setting = QaSetting::new(question, support, candidates);
        let mut answers = self.reader.answer(&[setting])?;
        answers.pop().context("Reader returned no answer")
    }

    /// Answers for every question in a JSON file (answers field optional)
    pub fn answer_file(&mut self, path: &str) -> Result<Vec<(QaSetting, Answer)>> {
        let settings = JsonLoader::new(path).load_all()?.settings();
        let answers  = QuestionAnswerer::answer(&mut self.reader, &settings)?;
        Ok(settings.into_iter().zip(answers).collect())
    }
}
