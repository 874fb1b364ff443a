// ============================================================
// Layer 5 — Reader
// ============================================================
// Wires InputModule → ModelModule → OutputModule together and
// drives the training loop.
//
//   Untrained ──setup──▶ SettingUp ──train──▶ Training{epoch, batch}
//                                                   │
//                                                   ▼
//                                               Trained
//
// Module wiring is checked once, in Reader::new, by DataPort
// set containment. Vocabularies are built once and frozen; a
// Reader never rebuilds them.
//
// Training loop, per epoch:
//   1. fresh batch sequence from the input module
//   2. per batch: validate → forward → loss (+ l2) → backward
//      → clip → optimiser step → at_iteration_end hooks
//   3. at_epoch_end hooks
//
// Reference: Burn Book §5 (Custom Training Loops)

use std::marker::PhantomData;
use std::sync::Arc;

use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::data::ports::{check_provided, input, prediction, target, DataPort, LOSS};
use crate::domain::error::{ReaderError, Result};
use crate::domain::qa_setting::{Answer, QaExample, QaSetting};
use crate::domain::traits::{QuestionAnswerer, TrainingHook};
use crate::ml::binding::float_array;
use crate::ml::input::{InputModule, ModelFInputModule};
use crate::ml::model::{ModelF, ModelModule};
use crate::ml::output::{ModelFOutputModule, OutputModule};
use crate::ml::shared::{ReaderConfig, SharedResources};
use crate::ml::trainer::{clip_gradients, l2_penalty, TrainOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Untrained,
    /// Vocabularies built and frozen, model allocated
    SettingUp,
    Training { epoch: usize, batch: usize },
    Trained,
}

pub struct Reader<B: AutodiffBackend, I, M, O> {
    input:    I,
    output:   O,
    model:    Option<M>,
    shared:   Option<Arc<SharedResources>>,
    config:   ReaderConfig,
    is_train: bool,
    state:    ReaderState,
    device:   B::Device,
    _backend: PhantomData<B>,
}

/// Ports that count answers rather than questions
const ANSWER_AXIS_PORTS: [DataPort; 2] = [target::ANSWER_SPAN, input::ANSWER_TO_QUESTION];

impl<B, I, M, O> Reader<B, I, M, O>
where
    B: AutodiffBackend,
    I: InputModule,
    M: ModelModule<B> + AutodiffModule<B>,
    O: OutputModule,
{
    /// Fails with DataContract when the modules' ports do not line up
    pub fn new(input: I, output: O, config: ReaderConfig, is_train: bool, device: B::Device) -> Result<Self> {
        check_wiring::<B, I, M, O>(&input, &output)?;
        Ok(Self {
            input,
            output,
            model: None,
            shared: None,
            config,
            is_train,
            state: ReaderState::Untrained,
            device,
            _backend: PhantomData,
        })
    }

    /// A ready-to-answer reader from saved resources and weights
    pub fn from_parts(input: I, output: O, shared: SharedResources, model: M, device: B::Device) -> Result<Self> {
        check_wiring::<B, I, M, O>(&input, &output)?;
        Ok(Self {
            input,
            output,
            model: Some(model),
            config: shared.config.clone(),
            shared: Some(Arc::new(shared)),
            is_train: false,
            state: ReaderState::Trained,
            device,
            _backend: PhantomData,
        })
    }

    /// Where the reader is in its lifecycle. After a failed `train`
    /// this still names the epoch and batch that failed.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Frozen vocabularies and config; None until set up.
    /// Serialise this to snapshot the reader.
    pub fn shared_resources(&self) -> Option<&SharedResources> {
        self.shared.as_deref()
    }

    /// The trained model; its record is the weight snapshot
    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    /// Build and freeze the vocabularies, then allocate the model.
    /// Does nothing once resources exist.
    pub fn setup_from_data(&mut self, examples: &[QaExample]) -> Result<()> {
        if self.shared.is_some() {
            return Ok(());
        }
        self.state = ReaderState::SettingUp;
        let shared = self.input.setup_from_data(examples, &self.config)?;
        self.model = Some(M::build(&shared, &self.device)?);
        self.shared = Some(Arc::new(shared));
        Ok(())
    }

    /// Train for `options.max_epochs` epochs over `training_set`.
    ///
    /// Errors abort the run; updates applied for earlier batches stay.
    pub fn train<Opt>(
        &mut self,
        optimizer:    &mut Opt,
        training_set: &[QaExample],
        options:      &TrainOptions,
        hooks:        &mut [&mut dyn TrainingHook],
    ) -> Result<()>
    where
        Opt: Optimizer<M, B>,
    {
        if !self.is_train {
            return Err(ReaderError::NotTrainable);
        }
        self.setup_from_data(training_set)?;
        let shared = self.shared.clone().ok_or_else(not_set_up)?;

        let batch_ports: Vec<DataPort> = self
            .input
            .output_ports()
            .into_iter()
            .chain(self.input.training_ports())
            .filter(|p| !ANSWER_AXIS_PORTS.contains(p))
            .collect();

        tracing::info!(
            "Training for {} epochs on {} examples (lr={}, l2={}, clip={:?})",
            options.max_epochs,
            training_set.len(),
            options.lr,
            options.l2,
            options.clip,
        );

        for epoch in 1..=options.max_epochs {
            let batches = self.input.dataset_generator(&shared, training_set, false, false)?;

            for (i, batch) in batches.iter().enumerate() {
                self.state = ReaderState::Training { epoch, batch: i + 1 };
                let batch = batch?;
                batch.validate(&batch_ports)?;

                let model   = self.model.as_ref().ok_or_else(not_set_up)?;
                let outputs = model.create_output(&shared, &batch, &self.device)?;
                let mut loss = model
                    .create_training_output(&shared, &outputs, &batch, &self.device)?
                    .vector(&LOSS)?
                    .sum();
                if options.l2 != 0.0 {
                    if let Some(penalty) = l2_penalty(&model.trainable_matrices()) {
                        loss = loss + penalty.mul_scalar(options.l2);
                    }
                }

                let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();
                let mut grads = GradientsParams::from_grads(loss.backward(), model);
                if let Some(policy) = options.clip {
                    clip_gradients(&mut grads, &model.trainable_matrices(), policy);
                }

                let model = self.model.take().ok_or_else(not_set_up)?;
                self.model = Some(optimizer.step(options.lr, model, grads));

                for hook in hooks.iter_mut() {
                    hook.at_iteration_end(epoch, loss_value as f32)?;
                }
            }

            for hook in hooks.iter_mut() {
                hook.at_epoch_end(epoch)?;
            }
        }

        self.state = ReaderState::Trained;
        Ok(())
    }

    /// Best candidate per setting
    pub fn answer(&mut self, settings: &[QaSetting]) -> Result<Vec<Answer>> {
        let shared = self.shared.clone().ok_or_else(not_set_up)?;
        let model  = self.model.as_ref().ok_or_else(not_set_up)?;

        let batch   = self.input.batch_for(&shared, settings)?;
        let outputs = model.create_output(&shared, &batch, &self.device)?;
        let scores  = float_array(outputs.matrix(&prediction::CANDIDATE_SCORES)?)?;
        self.output.answer(settings, &scores)
    }
}

impl<B, I, M, O> QuestionAnswerer for Reader<B, I, M, O>
where
    B: AutodiffBackend,
    I: InputModule,
    M: ModelModule<B> + AutodiffModule<B>,
    O: OutputModule,
{
    fn answer(&mut self, settings: &[QaSetting]) -> Result<Vec<Answer>> {
        Reader::answer(self, settings)
    }
}

fn not_set_up() -> ReaderError {
    ReaderError::Configuration("reader has no resources yet; run setup or train first".into())
}

/// Input feeds the model, the model (or input) feeds training,
/// the model feeds the output module.
fn check_wiring<B, I, M, O>(input: &I, output: &O) -> Result<()>
where
    B: Backend,
    I: InputModule,
    M: ModelModule<B>,
    O: OutputModule,
{
    let provided = input.output_ports();
    check_provided(&provided, &M::input_ports())?;

    let training_available: Vec<DataPort> = provided
        .into_iter()
        .chain(input.training_ports())
        .chain(M::output_ports())
        .collect();
    check_provided(&training_available, &M::training_input_ports())?;

    check_provided(&M::output_ports(), &output.input_ports())
}

// ─── Model F reader ───────────────────────────────────────────────────────────
pub type ModelFReader<B> = Reader<B, ModelFInputModule, ModelF<B>, ModelFOutputModule>;

/// A Model F reader with the default whitespace tokenizer.
///
/// Fails with DataContract only if the Model F modules stop
/// agreeing on their ports.
pub fn model_f_reader<B: AutodiffBackend>(
    config:   ReaderConfig,
    is_train: bool,
    device:   B::Device,
) -> Result<ModelFReader<B>> {
    let input = ModelFInputModule::new(config.seed);
    Reader::new(input, ModelFOutputModule, config, is_train, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::qa_setting::Answer;
    use burn::backend::{Autodiff, NdArray};
    use crate::data::batcher::{Array, Batch, BatchSequence, PortValue};
    use crate::data::pipeline::{pipeline, Corpus, PipelineOptions, RawCorpus};
    use crate::data::preprocessor::WhitespaceTokenizer;
    use crate::ml::input::model_f_layout;
    use burn::optim::{AdamConfig, SgdConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = Autodiff<NdArray>;

    fn example(q: &str, cands: &[&str], answer: &str) -> QaExample {
        QaExample::new(
            QaSetting::new(q, vec![], cands.iter().map(|c| c.to_string()).collect()),
            vec![Answer::new(answer)],
        )
    }

    fn data() -> Vec<QaExample> {
        let cands = ["Paris", "Berlin", "Rome", "Madrid"];
        vec![
            example("capital_of France", &cands, "Paris"),
            example("capital_of Germany", &cands, "Berlin"),
            example("capital_of Italy", &cands, "Rome"),
            example("capital_of Spain", &cands, "Madrid"),
        ]
    }

    fn reader(is_train: bool) -> ModelFReader<TestBackend> {
        model_f_reader(ReaderConfig::new().with_batch_size(2), is_train, Default::default()).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        iterations: Vec<(usize, f32)>,
        epochs:     Vec<usize>,
    }

    impl TrainingHook for Recorder {
        fn at_iteration_end(&mut self, epoch: usize, loss: f32) -> anyhow::Result<()> {
            self.iterations.push((epoch, loss));
            Ok(())
        }

        fn at_epoch_end(&mut self, epoch: usize) -> anyhow::Result<()> {
            self.epochs.push(epoch);
            Ok(())
        }
    }

    struct StopAfter(usize);

    impl TrainingHook for StopAfter {
        fn at_iteration_end(&mut self, _epoch: usize, _loss: f32) -> anyhow::Result<()> {
            Ok(())
        }

        fn at_epoch_end(&mut self, epoch: usize) -> anyhow::Result<()> {
            if epoch >= self.0 {
                anyhow::bail!("stop at epoch {epoch}");
            }
            Ok(())
        }
    }

    fn embeddings(r: &ModelFReader<TestBackend>) -> Vec<f32> {
        r.model().unwrap().embeddings.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_epoch_hooks_fire_in_order() {
        let mut r = reader(true);
        let mut optim = AdamConfig::new().init();
        let mut rec = Recorder::default();
        let options = TrainOptions { max_epochs: 3, lr: 0.05, ..Default::default() };

        r.train(&mut optim, &data(), &options, &mut [&mut rec]).unwrap();

        assert_eq!(rec.epochs, vec![1, 2, 3]);
        // 4 examples, batch size 2
        assert_eq!(rec.iterations.len(), 6);
        assert!(rec.iterations.iter().all(|(_, l)| l.is_finite()));
        assert_eq!(r.state(), ReaderState::Trained);
    }

    #[test]
    fn test_not_trainable() {
        let mut r = reader(false);
        let mut optim = AdamConfig::new().init();
        let err = r.train(&mut optim, &data(), &TrainOptions::default(), &mut []).unwrap_err();
        assert!(matches!(err, ReaderError::NotTrainable));
        assert_eq!(r.state(), ReaderState::Untrained);
    }

    #[test]
    fn test_miswired_output_is_rejected() {
        struct SpanOutput;
        impl OutputModule for SpanOutput {
            fn input_ports(&self) -> Vec<DataPort> {
                vec![prediction::START_SCORES, prediction::END_SCORES]
            }
            fn answer(&self, _: &[QaSetting], _: &crate::data::batcher::Array<f32>) -> Result<Vec<Answer>> {
                Ok(Vec::new())
            }
        }

        let result = Reader::<TestBackend, _, ModelF<TestBackend>, _>::new(
            ModelFInputModule::new(0),
            SpanOutput,
            ReaderConfig::new(),
            true,
            Default::default(),
        );
        match result {
            Err(ReaderError::DataContract { missing }) => {
                assert_eq!(missing, vec!["start_scores", "end_scores"]);
            }
            _ => panic!("expected a data contract error"),
        }
    }

    #[test]
    fn test_hook_error_aborts_and_keeps_updates() {
        let mut r = reader(true);
        let mut optim = AdamConfig::new().init();
        let mut rec = Recorder::default();
        let mut stop = StopAfter(2);
        let options = TrainOptions { max_epochs: 5, lr: 0.05, ..Default::default() };

        let err = r.train(&mut optim, &data(), &options, &mut [&mut rec, &mut stop]).unwrap_err();
        assert!(matches!(err, ReaderError::Hook(_)));
        assert_eq!(err.to_string(), "stop at epoch 2");
        assert_eq!(rec.epochs, vec![1, 2]);
        assert!(r.model().is_some());
        assert_eq!(r.state(), ReaderState::Training { epoch: 2, batch: 2 });
    }

    /// Model F input whose second batch carries one target too few
    struct BrokenSecondBatch(ModelFInputModule);

    fn broken_second_batch(corpus: &Corpus, indices: &[usize]) -> Result<Batch> {
        let mut batch = model_f_layout(corpus, indices)?;
        if indices.contains(&2) {
            batch.insert(target::TARGET_INDEX, PortValue::Int(Array::vector(vec![0])));
        }
        Ok(batch)
    }

    impl InputModule for BrokenSecondBatch {
        fn output_ports(&self) -> Vec<DataPort> {
            self.0.output_ports()
        }

        fn training_ports(&self) -> Vec<DataPort> {
            self.0.training_ports()
        }

        fn setup_from_data(&mut self, examples: &[QaExample], config: &ReaderConfig) -> Result<SharedResources> {
            self.0.setup_from_data(examples, config)
        }

        fn dataset_generator(
            &mut self,
            shared:     &SharedResources,
            examples:   &[QaExample],
            _is_eval:   bool,
            _test_time: bool,
        ) -> Result<BatchSequence> {
            let raw  = RawCorpus::from_examples(examples, true)?;
            let opts = PipelineOptions { tokenization: false, ..Default::default() };
            let mut rng = StdRng::seed_from_u64(0);
            let (corpus, _) = pipeline(raw, shared.frozen_view(), &opts, &WhitespaceTokenizer, &mut rng)?;
            Ok(BatchSequence::new(corpus, (0..examples.len()).collect(), 2, broken_second_batch))
        }

        fn batch_for(&mut self, shared: &SharedResources, settings: &[QaSetting]) -> Result<Batch> {
            self.0.batch_for(shared, settings)
        }
    }

    #[test]
    fn test_malformed_batch_aborts_and_keeps_earlier_updates() {
        let mut r = Reader::<TestBackend, _, ModelF<TestBackend>, _>::new(
            BrokenSecondBatch(ModelFInputModule::new(0)),
            ModelFOutputModule,
            ReaderConfig::new(),
            true,
            Default::default(),
        ).unwrap();
        let weights = |r: &Reader<TestBackend, BrokenSecondBatch, ModelF<TestBackend>, ModelFOutputModule>| {
            r.model().unwrap().embeddings.val().into_data().to_vec::<f32>().unwrap()
        };
        r.setup_from_data(&data()).unwrap();
        let before = weights(&r);

        let mut optim = SgdConfig::new().init();
        let mut rec = Recorder::default();
        let options = TrainOptions { max_epochs: 3, lr: 1.0, ..Default::default() };
        let err = r.train(&mut optim, &data(), &options, &mut [&mut rec]).unwrap_err();

        assert!(matches!(err, ReaderError::ShapeMismatch(_)), "got {err:?}");
        assert_eq!(r.state(), ReaderState::Training { epoch: 1, batch: 2 });
        assert_eq!(rec.iterations.len(), 1);
        assert!(rec.epochs.is_empty());
        assert_ne!(weights(&r), before);
    }

    #[test]
    fn test_value_clip_bounds_each_step() {
        let mut r = reader(true);
        r.setup_from_data(&data()).unwrap();
        let before = embeddings(&r);

        let mut optim = SgdConfig::new().init();
        let options = TrainOptions {
            max_epochs: 1,
            lr:         1.0,
            l2:         0.0,
            clip:       Some(crate::ml::trainer::ClipPolicy::Value { min: -0.01, max: 0.01 }),
        };
        let data = data();
        r.train(&mut optim, &data[..2], &options, &mut []).unwrap();

        let after = embeddings(&r);
        let max_change = before
            .iter()
            .zip(&after)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_change <= 0.01 + 1e-6, "step moved a weight by {max_change}");
        assert!(max_change > 0.0);
    }

    #[test]
    fn test_l2_pulls_weights_down() {
        let data = data();
        let run = |l2: f64| {
            let mut r = reader(true);
            let mut optim = SgdConfig::new().init();
            let options = TrainOptions { max_epochs: 2, lr: 0.1, l2, clip: None };
            r.train(&mut optim, &data, &options, &mut []).unwrap();
            embeddings(&r).iter().map(|w| w * w).sum::<f32>()
        };
        assert!(run(1.0) < run(0.0));
    }

    #[test]
    fn test_answer_before_setup_is_an_error() {
        let mut r = reader(false);
        let settings = vec![data()[0].setting.clone()];
        assert!(matches!(r.answer(&settings), Err(ReaderError::Configuration(_))));
    }

    #[test]
    fn test_trained_reader_answers_training_questions() {
        let data = data();
        let mut r = reader(true);
        let mut optim = AdamConfig::new().init();
        let options = TrainOptions { max_epochs: 60, lr: 0.1, ..Default::default() };
        r.train(&mut optim, &data, &options, &mut []).unwrap();

        let settings: Vec<QaSetting> = data.iter().map(|e| e.setting.clone()).collect();
        let answers = r.answer(&settings).unwrap();
        assert_eq!(answers.len(), 4);
        let correct = answers
            .iter()
            .zip(&data)
            .filter(|(a, e)| a.text == e.answers[0].text)
            .count();
        assert!(correct >= 3, "only {correct} of 4 correct");
    }
}
