// ============================================================
// Layer 5 — Model Modules
// ============================================================
// A ModelModule turns a numeric Batch into scores, and in
// training mode into a scalar LOSS. Port sets are associated
// functions so the Reader can check wiring before any model
// has been built.
//
// Model F: bilinear embedding scorer
//
//   q      = mean of the question's token embeddings   [batch, dim]
//   c_i    = embedding of candidate i                  [batch, n, dim]
//   s_i    = c_i · q                                   [batch, n]
//   loss   = softplus(Σ_i s_i − 2·s_answer), batch mean
//
// One embedding table is shared by questions, candidates and
// answers, so Model F needs a single id space.
//
// Reference: Riedel et al. (2013) Relation Extraction with
//            Matrix Factorization and Universal Schemas

use burn::{
    module::Param,
    prelude::*,
    tensor::{activation, Distribution},
};

use crate::data::batcher::Batch;
use crate::data::ports::{input, prediction, target, DataPort, LOSS};
use crate::data::vocab::PAD_ID;
use crate::domain::error::{self, ReaderError};
use crate::ml::binding::{int_tensor_1d, int_tensor_2d, PortTensor, PortTensors};
use crate::ml::shared::SharedResources;

pub trait ModelModule<B: Backend>: Module<B> + Sized {
    /// Ports read by `create_output`
    fn input_ports() -> Vec<DataPort>;

    /// Ports read by `create_training_output`, drawn from the input
    /// module's batch or from this module's own outputs
    fn training_input_ports() -> Vec<DataPort>;

    /// Ports produced by `create_output`, in order
    fn output_ports() -> Vec<DataPort>;

    fn training_output_ports() -> Vec<DataPort>;

    /// Allocate trainable parameters sized from the shared resources
    fn build(shared: &SharedResources, device: &B::Device) -> error::Result<Self>;

    /// Scores for `batch`, in `output_ports()` order
    fn create_output(
        &self,
        shared: &SharedResources,
        batch:  &Batch,
        device: &B::Device,
    ) -> error::Result<PortTensors<B>>;

    /// LOSS from the training inputs and the outputs of `create_output`
    fn create_training_output(
        &self,
        shared:  &SharedResources,
        outputs: &PortTensors<B>,
        batch:   &Batch,
        device:  &B::Device,
    ) -> error::Result<PortTensors<B>>;

    /// Every trainable weight matrix, for l2 and gradient clipping
    fn trainable_matrices(&self) -> Vec<&Param<Tensor<B, 2>>>;
}

// ─── Model F ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ModelFConfig {
    pub num_ids: usize,
    #[config(default = 10)]
    pub repr_dim: usize,
}

impl ModelFConfig {
    /// Glorot-uniform embedding table [num_ids, repr_dim]
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelF<B> {
        let limit = (6.0 / (self.num_ids + self.repr_dim) as f64).sqrt();
        let table = Tensor::<B, 2>::random(
            [self.num_ids, self.repr_dim],
            Distribution::Uniform(-limit, limit),
            device,
        );
        ModelF::from_embeddings(table)
    }
}

#[derive(Module, Debug)]
pub struct ModelF<B: Backend> {
    pub embeddings: Param<Tensor<B, 2>>,
}

impl<B: Backend> ModelF<B> {
    /// Wrap an existing [num_ids, repr_dim] table as the trainable parameter
    pub fn from_embeddings(table: Tensor<B, 2>) -> Self {
        Self { embeddings: Param::from_tensor(table) }
    }

    pub fn repr_dim(&self) -> usize {
        self.embeddings.dims()[1]
    }

    /// Gather rows of the embedding table: ids [b, n] → [b, n, dim]
    fn embed(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [b, n] = ids.dims();
        let dim = self.repr_dim();
        self.embeddings
            .val()
            .select(0, ids.reshape([b * n]))
            .reshape([b, n, dim])
    }
}

impl<B: Backend> ModelModule<B> for ModelF<B> {
    fn input_ports() -> Vec<DataPort> {
        vec![input::QUESTION, input::QUESTION_LENGTHS, input::ATOMIC_CANDIDATES]
    }

    fn training_input_ports() -> Vec<DataPort> {
        vec![prediction::CANDIDATE_SCORES, target::TARGET_INDEX]
    }

    fn output_ports() -> Vec<DataPort> {
        vec![prediction::CANDIDATE_SCORES]
    }

    fn training_output_ports() -> Vec<DataPort> {
        vec![LOSS]
    }

    fn build(shared: &SharedResources, device: &B::Device) -> error::Result<Self> {
        if shared.config.sepvocab {
            return Err(ReaderError::Configuration(
                "model F embeds questions and candidates in one table; sepvocab must be false".into(),
            ));
        }
        let cfg = ModelFConfig::new(shared.num_ids()).with_repr_dim(shared.config.repr_dim);
        tracing::debug!("Model F: {} ids × {} dims", cfg.num_ids, cfg.repr_dim);
        Ok(cfg.init(device))
    }

    fn create_output(
        &self,
        _shared: &SharedResources,
        batch:   &Batch,
        device:  &B::Device,
    ) -> error::Result<PortTensors<B>> {
        let question   = int_tensor_2d::<B>(batch.int(&input::QUESTION)?, device)?;
        let lengths    = int_tensor_1d::<B>(batch.int(&input::QUESTION_LENGTHS)?, device)?;
        let candidates = int_tensor_2d::<B>(batch.int(&input::ATOMIC_CANDIDATES)?, device)?;
        let [b, q_len] = question.dims();
        let [cb, n]    = candidates.dims();
        let [lb]       = lengths.dims();
        if b != cb || b != lb {
            return Err(ReaderError::shape(format!(
                "{} questions, {} question lengths and {} candidate rows", b, lb, cb
            )));
        }

        // Mean over real question tokens. An atomic question is its own embedding.
        let q_mask  = question.clone().greater_elem(PAD_ID as i64).float().reshape([b, q_len, 1]);
        let q_sum   = (self.embed(question) * q_mask).sum_dim(1);                // [b, 1, dim]
        let q_count = lengths.float().clamp_min(1.0).reshape([b, 1, 1]);
        let q_vec   = q_sum / q_count;

        let c_mask = candidates.clone().greater_elem(PAD_ID as i64).float();
        let scores = (self.embed(candidates) * q_vec).sum_dim(2).reshape([b, n]) * c_mask;

        let mut out = PortTensors::new();
        out.push(prediction::CANDIDATE_SCORES, PortTensor::Matrix(scores));
        Ok(out)
    }

    fn create_training_output(
        &self,
        _shared: &SharedResources,
        outputs: &PortTensors<B>,
        batch:   &Batch,
        device:  &B::Device,
    ) -> error::Result<PortTensors<B>> {
        let scores  = outputs.matrix(&prediction::CANDIDATE_SCORES)?;
        let targets = batch.int(&target::TARGET_INDEX)?;
        let [b, n]  = scores.dims();

        if targets.batch_size() != b {
            return Err(ReaderError::shape(format!(
                "{} targets for {} score rows", targets.batch_size(), b
            )));
        }
        if let Some(bad) = targets.data().iter().find(|&&t| t < 0 || t as usize >= n) {
            return Err(ReaderError::shape(format!(
                "target index {} outside {} candidates", bad, n
            )));
        }

        let targets = int_tensor_1d::<B>(targets, device)?.reshape([b, 1]);
        let answer  = scores.clone().gather(1, targets).reshape([b]);
        let total   = scores.sum_dim(1).reshape([b]);
        let loss    = activation::softplus(total - answer.mul_scalar(2.0), 1.0).mean();

        let mut out = PortTensors::new();
        out.push(LOSS, PortTensor::Vector(loss));
        Ok(out)
    }

    fn trainable_matrices(&self) -> Vec<&Param<Tensor<B, 2>>> {
        vec![&self.embeddings]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::{pad_ids, Array, PortValue};
    use crate::data::vocab::Vocab;
    use crate::ml::binding::float_array;
    use crate::ml::shared::ReaderConfig;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn shared(sepvocab: bool) -> SharedResources {
        let v = Vocab::new();
        SharedResources::new(v.clone(), v.clone(), v, ReaderConfig::new().with_sepvocab(sepvocab))
    }

    /// Rows: PAD, UNK, id 2 = [1, 0], id 3 = [0, 1]
    fn model() -> ModelF<TestBackend> {
        let table = Tensor::from_data(
            TensorData::new(vec![0.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0], [4, 2]),
            &Default::default(),
        );
        ModelF::from_embeddings(table)
    }

    fn batch(questions: &[Vec<u32>], candidates: &[Vec<u32>], targets: Option<Vec<i64>>) -> Batch {
        let lengths = questions.iter().map(|q| q.len() as i64).collect();
        let mut b = Batch::new();
        b.insert(input::QUESTION, PortValue::Int(pad_ids(questions)));
        b.insert(input::QUESTION_LENGTHS, PortValue::Int(Array::vector(lengths)));
        b.insert(input::ATOMIC_CANDIDATES, PortValue::Int(pad_ids(candidates)));
        if let Some(t) = targets {
            b.insert(target::TARGET_INDEX, PortValue::Int(Array::vector(t)));
        }
        b
    }

    #[test]
    fn test_bilinear_scores() {
        let device = Default::default();
        let out = model().create_output(&shared(false), &batch(&[vec![2]], &[vec![2, 3]], None), &device).unwrap();
        let scores = float_array(out.matrix(&prediction::CANDIDATE_SCORES).unwrap()).unwrap();
        assert_eq!(scores.data(), &[1.0, 0.0]);
    }

    #[test]
    fn test_padded_candidates_score_zero() {
        let device = Default::default();
        let b = batch(&[vec![2], vec![3]], &[vec![2, 3], vec![3]], None);
        let out = model().create_output(&shared(false), &b, &device).unwrap();
        let scores = float_array(out.matrix(&prediction::CANDIDATE_SCORES).unwrap()).unwrap();
        assert_eq!(scores.row(1), Some(&[1.0f32, 0.0][..]));
    }

    #[test]
    fn test_question_mean_ignores_padding() {
        let device = Default::default();
        // [1,0] and [0,1] average to [0.5, 0.5]; the short question is just [1,0]
        let b = batch(&[vec![2, 3], vec![2]], &[vec![2], vec![2]], None);
        let out = model().create_output(&shared(false), &b, &device).unwrap();
        let scores = float_array(out.matrix(&prediction::CANDIDATE_SCORES).unwrap()).unwrap();
        assert_eq!(scores.data(), &[0.5, 1.0]);
    }

    #[test]
    fn test_missing_lengths_is_a_contract_error() {
        let device = Default::default();
        let mut b = Batch::new();
        b.insert(input::QUESTION, PortValue::Int(pad_ids(&[vec![2]])));
        b.insert(input::ATOMIC_CANDIDATES, PortValue::Int(pad_ids(&[vec![2, 3]])));
        assert!(matches!(
            model().create_output(&shared(false), &b, &device),
            Err(ReaderError::DataContract { .. })
        ));
    }

    #[test]
    fn test_softplus_loss() {
        let device = Default::default();
        let m = model();
        let s = shared(false);
        let b = batch(&[vec![2]], &[vec![2, 3]], Some(vec![0]));
        let out  = m.create_output(&s, &b, &device).unwrap();
        let loss = m.create_training_output(&s, &out, &b, &device).unwrap();
        let value: f32 = loss.vector(&LOSS).unwrap().into_scalar();
        // softplus(1 + 0 − 2·1) = ln(1 + e^-1)
        assert!((value - (1.0f32 + (-1.0f32).exp()).ln()).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_range_target() {
        let device = Default::default();
        let m = model();
        let s = shared(false);
        let b = batch(&[vec![2]], &[vec![2, 3]], Some(vec![2]));
        let out = m.create_output(&s, &b, &device).unwrap();
        assert!(matches!(
            m.create_training_output(&s, &out, &b, &device),
            Err(ReaderError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_build_rejects_sepvocab() {
        let device = Default::default();
        assert!(matches!(
            ModelF::<TestBackend>::build(&shared(true), &device),
            Err(ReaderError::Configuration(_))
        ));
        let m = ModelF::<TestBackend>::build(&shared(false), &device).unwrap();
        assert_eq!(m.embeddings.dims(), [2, 10]);
    }
}
