// ============================================================
// Layer 5 — Port ↔ Tensor Binding
// ============================================================
// The data layer speaks host arrays, the model speaks burn
// tensors. This module is the only crossing point:
//
//   Batch (Array<i64>)   ──int_tensor_2d──▶  Tensor<B, 2, Int>
//   Tensor<B, 2>         ──float_array────▶  Array<f32>
//
// PortTensors is what a ModelModule returns: tensors keyed by
// DataPort, kept in the order the module declared them.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::data::batcher::Array;
use crate::data::ports::DataPort;
use crate::domain::error::{ReaderError, Result};

// ─── PortTensor ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub enum PortTensor<B: Backend> {
    /// Rank-1 float tensor, e.g. LOSS
    Vector(Tensor<B, 1>),
    /// Rank-2 float tensor, e.g. CANDIDATE_SCORES [batch, n]
    Matrix(Tensor<B, 2>),
}

#[derive(Debug, Clone)]
pub struct PortTensors<B: Backend> {
    entries: Vec<(DataPort, PortTensor<B>)>,
}

impl<B: Backend> Default for PortTensors<B> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<B: Backend> PortTensors<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `tensor` to `port`, replacing any earlier binding
    pub fn push(&mut self, port: DataPort, tensor: PortTensor<B>) {
        self.entries.retain(|(p, _)| *p != port);
        self.entries.push((port, tensor));
    }

    pub fn get(&self, port: &DataPort) -> Option<&PortTensor<B>> {
        self.entries.iter().find(|(p, _)| p == port).map(|(_, t)| t)
    }

    /// Bound ports, in binding order
    pub fn ports(&self) -> Vec<DataPort> {
        self.entries.iter().map(|(p, _)| *p).collect()
    }

    pub fn matrix(&self, port: &DataPort) -> Result<Tensor<B, 2>> {
        match self.get(port) {
            Some(PortTensor::Matrix(t)) => Ok(t.clone()),
            Some(PortTensor::Vector(_)) => Err(ReaderError::shape(format!(
                "port '{}' is bound to a vector, expected a matrix", port.name
            ))),
            None => Err(ReaderError::DataContract { missing: vec![port.name] }),
        }
    }

    pub fn vector(&self, port: &DataPort) -> Result<Tensor<B, 1>> {
        match self.get(port) {
            Some(PortTensor::Vector(t)) => Ok(t.clone()),
            Some(PortTensor::Matrix(_)) => Err(ReaderError::shape(format!(
                "port '{}' is bound to a matrix, expected a vector", port.name
            ))),
            None => Err(ReaderError::DataContract { missing: vec![port.name] }),
        }
    }
}

// ─── Host → device ────────────────────────────────────────────────────────────
/// Rank-1 int array as a tensor; ShapeMismatch for any other rank
pub fn int_tensor_1d<B: Backend>(array: &Array<i64>, device: &B::Device) -> Result<Tensor<B, 1, Int>> {
    match array.shape() {
        &[n] => Ok(Tensor::from_data(TensorData::new(array.data().to_vec(), [n]), device)),
        other => Err(ReaderError::shape(format!("expected a rank-1 array, got shape {:?}", other))),
    }
}

/// Rank-2 int array as a tensor; ShapeMismatch for any other rank
pub fn int_tensor_2d<B: Backend>(array: &Array<i64>, device: &B::Device) -> Result<Tensor<B, 2, Int>> {
    match array.shape() {
        &[rows, cols] => Ok(Tensor::from_data(
            TensorData::new(array.data().to_vec(), [rows, cols]),
            device,
        )),
        other => Err(ReaderError::shape(format!("expected a rank-2 array, got shape {:?}", other))),
    }
}

// ─── Device → host ────────────────────────────────────────────────────────────
/// Copy a float matrix back to the host, e.g. scores for the
/// output module
pub fn float_array<B: Backend>(tensor: Tensor<B, 2>) -> Result<Array<f32>> {
    let [rows, cols] = tensor.dims();
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ReaderError::shape(format!("cannot read scores back: {:?}", e)))?;
    Array::new(vec![rows, cols], values)
}
