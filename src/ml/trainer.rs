// ============================================================
// Layer 5 — Training Step Utilities
// ============================================================
// Pieces of one gradient step that sit around the optimiser:
//
//   loss = model loss + l2 · Σ‖w‖²
//   grads = loss.backward()
//   grads = clip(grads)            (optional)
//   model = optim.step(lr, model, grads)
//
// Clipping is per tensor:
//   Value { min, max } → clamp every element into [min, max]
//   Norm(n)            → rescale a tensor whose L2 norm exceeds n
//
// Reference: Burn Book §5, Pascanu et al. (2013) On the
//            difficulty of training recurrent neural networks

use burn::{
    module::Param,
    optim::GradientsParams,
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClipPolicy {
    Value { min: f32, max: f32 },
    Norm(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    pub max_epochs: usize,
    pub lr:         f64,
    /// Weight of the squared-L2 penalty; 0 disables it
    pub l2:         f64,
    pub clip:       Option<ClipPolicy>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self { max_epochs: 10, lr: 1e-3, l2: 0.0, clip: None }
    }
}

/// Σ‖w‖² over `params`, or None when there are none
pub fn l2_penalty<B: Backend>(params: &[&Param<Tensor<B, 2>>]) -> Option<Tensor<B, 1>> {
    params
        .iter()
        .map(|p| p.val().powf_scalar(2.0).sum())
        .reduce(|acc, t| acc + t)
}

/// Clip the gradient of every listed parameter in place.
/// Parameters without a gradient are left alone.
pub fn clip_gradients<B: AutodiffBackend>(
    grads:  &mut GradientsParams,
    params: &[&Param<Tensor<B, 2>>],
    policy: ClipPolicy,
) {
    for param in params {
        let Some(grad) = grads.remove::<B::InnerBackend, 2>(param.id) else {
            continue;
        };
        let clipped = match policy {
            ClipPolicy::Value { min, max } => grad.clamp(min, max),
            ClipPolicy::Norm(max_norm) => {
                let norm: f32 = grad.clone().powf_scalar(2.0).sum().sqrt().into_scalar().elem();
                if norm > max_norm {
                    grad.mul_scalar(max_norm / norm)
                } else {
                    grad
                }
            }
        };
        grads.register::<B::InnerBackend, 2>(param.id, clipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::ModelF;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::TensorData;

    type TestBackend = Autodiff<NdArray>;

    fn model(values: Vec<f32>) -> ModelF<TestBackend> {
        let n = values.len() / 2;
        ModelF::from_embeddings(Tensor::from_data(TensorData::new(values, [n, 2]), &Default::default()))
    }

    fn grads_of(m: &ModelF<TestBackend>, scale: f32) -> GradientsParams {
        let loss = m.embeddings.val().sum().mul_scalar(scale);
        GradientsParams::from_grads(loss.backward(), m)
    }

    fn grad_values(grads: &GradientsParams, m: &ModelF<TestBackend>) -> Vec<f32> {
        grads
            .get::<NdArray, 2>(m.embeddings.id)
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn test_l2_penalty() {
        let m = model(vec![1.0, 2.0, 0.0, 2.0]);
        let p: f32 = l2_penalty(&[&m.embeddings]).unwrap().into_scalar();
        assert!((p - 9.0).abs() < 1e-6);
        assert!(l2_penalty::<TestBackend>(&[]).is_none());
    }

    #[test]
    fn test_value_clipping() {
        let m = model(vec![0.0; 4]);
        let mut grads = grads_of(&m, 5.0);
        clip_gradients(&mut grads, &[&m.embeddings], ClipPolicy::Value { min: -1.0, max: 0.5 });
        assert_eq!(grad_values(&grads, &m), vec![0.5; 4]);
    }

    #[test]
    fn test_norm_clipping() {
        let m = model(vec![0.0; 4]);
        // gradient is 3.0 everywhere: norm 6
        let mut grads = grads_of(&m, 3.0);
        clip_gradients(&mut grads, &[&m.embeddings], ClipPolicy::Norm(1.5));
        for g in grad_values(&grads, &m) {
            assert!((g - 0.75).abs() < 1e-5);
        }

        let mut grads = grads_of(&m, 0.1);
        clip_gradients(&mut grads, &[&m.embeddings], ClipPolicy::Norm(1.5));
        for g in grad_values(&grads, &m) {
            assert!((g - 0.1).abs() < 1e-6);
        }
    }
}
