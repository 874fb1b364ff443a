// ============================================================
// Layer 4 — Batches
// ============================================================
// A Batch maps DataPorts to host-side arrays. One batch is one
// gradient step's worth of examples.
//
// How batching works here:
//   Input:  per-example id sequences of different lengths
//   Output: Array with shape [batch_size, max_len], padded with
//           PAD_ID, stored row-major in one flat Vec
//
//   [[4, 5], [6]]  →  shape [2, 2], data [4, 5, 6, 0]
//
// BatchSequence is the lazy, restartable stream the training loop
// consumes: it owns the preprocessed corpus for one epoch and
// realises a single padded Batch per `next()`.
//
// Reference: Rust Book §8 (Vectors), §13 (Iterators)

use std::collections::HashMap;

use crate::data::pipeline::Corpus;
use crate::data::ports::{DataPort, ElementType};
use crate::data::vocab::PAD_ID;
use crate::domain::error::{ReaderError, Result};

// ─── Array ────────────────────────────────────────────────────────────────────
/// A dense row-major array with an explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T> {
    shape: Vec<usize>,
    data:  Vec<T>,
}

impl<T: Copy> Array<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ReaderError::shape(format!(
                "shape {:?} needs {} elements, got {}",
                shape, expected, data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// A 1-D array
    pub fn vector(data: Vec<T>) -> Self {
        Self { shape: vec![data.len()], data }
    }

    /// Stack variable-length rows into [rows, max_len], padding with `pad`
    pub fn padded(rows: &[Vec<T>], pad: T) -> Self {
        let max_len = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * max_len);
        for row in rows {
            data.extend_from_slice(row);
            data.extend(std::iter::repeat(pad).take(max_len - row.len()));
        }
        Self { shape: vec![rows.len(), max_len], data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Size of the leading (batch) axis
    pub fn batch_size(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Row `i` of a 2-D array
    pub fn row(&self, i: usize) -> Option<&[T]> {
        if self.shape.len() != 2 || i >= self.shape[0] {
            return None;
        }
        let width = self.shape[1];
        Some(&self.data[i * width..(i + 1) * width])
    }
}

// ─── PortValue ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Int(Array<i64>),
    Float(Array<f32>),
}

impl PortValue {
    pub fn shape(&self) -> &[usize] {
        match self {
            PortValue::Int(a)   => a.shape(),
            PortValue::Float(a) => a.shape(),
        }
    }

    pub fn dtype(&self) -> ElementType {
        match self {
            PortValue::Int(_)   => ElementType::Int,
            PortValue::Float(_) => ElementType::Float,
        }
    }
}

// ─── Batch ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    values: HashMap<DataPort, PortValue>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `port`, replacing any earlier binding.
    /// Shapes are checked later, by `validate`.
    pub fn insert(&mut self, port: DataPort, value: PortValue) {
        self.values.insert(port, value);
    }

    pub fn get(&self, port: &DataPort) -> Option<&PortValue> {
        self.values.get(port)
    }

    /// True when `port` is bound in this batch
    pub fn contains(&self, port: &DataPort) -> bool {
        self.values.contains_key(port)
    }

    /// Every bound port, in no particular order
    pub fn ports(&self) -> Vec<DataPort> {
        self.values.keys().copied().collect()
    }

    /// Integer array bound to `port`, or a DataContract error
    pub fn int(&self, port: &DataPort) -> Result<&Array<i64>> {
        match self.values.get(port) {
            Some(PortValue::Int(a)) => Ok(a),
            Some(PortValue::Float(_)) => Err(ReaderError::shape(format!(
                "port '{}' holds floats, expected ints", port.name
            ))),
            None => Err(ReaderError::DataContract { missing: vec![port.name] }),
        }
    }

    pub fn float(&self, port: &DataPort) -> Result<&Array<f32>> {
        match self.values.get(port) {
            Some(PortValue::Float(a)) => Ok(a),
            Some(PortValue::Int(_)) => Err(ReaderError::shape(format!(
                "port '{}' holds ints, expected floats", port.name
            ))),
            None => Err(ReaderError::DataContract { missing: vec![port.name] }),
        }
    }

    /// Batch size taken from any bound array
    pub fn batch_size(&self) -> usize {
        self.values.values().next().map(|v| v.shape()[0]).unwrap_or(0)
    }

    /// Every array must match its port's rank/type and share the
    /// batch dimension of `batch_ports`.
    ///
    /// Ports such as ANSWER_SPAN count answers rather than questions,
    /// so only the listed ports are held to a common batch size.
    pub fn validate(&self, batch_ports: &[DataPort]) -> Result<()> {
        for (port, value) in &self.values {
            if port.dtype != value.dtype() {
                return Err(ReaderError::shape(format!(
                    "port '{}' declared {:?}, bound {:?}",
                    port.name, port.dtype, value.dtype()
                )));
            }
            port.check_shape(value.shape())?;
        }

        let mut sizes = batch_ports
            .iter()
            .filter_map(|p| self.values.get(p).map(|v| (p.name, v.shape()[0])));
        if let Some((first_name, first)) = sizes.next() {
            for (name, size) in sizes {
                if size != first {
                    return Err(ReaderError::shape(format!(
                        "'{}' has batch size {} but '{}' has {}",
                        name, size, first_name, first
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Pad id rows with PAD_ID and widen to i64 for the tensor engine
pub fn pad_ids(rows: &[Vec<u32>]) -> Array<i64> {
    let widened: Vec<Vec<i64>> = rows
        .iter()
        .map(|r| r.iter().map(|&x| x as i64).collect())
        .collect();
    Array::padded(&widened, PAD_ID as i64)
}

// ─── BatchSequence ────────────────────────────────────────────────────────────
/// Turns the corpus rows at the given indices into one Batch
pub type BatchLayout = fn(&Corpus, &[usize]) -> Result<Batch>;

/// Lazy, finite, restartable sequence of batches over one corpus.
pub struct BatchSequence {
    corpus:     Corpus,
    order:      Vec<usize>,
    batch_size: usize,
    layout:     BatchLayout,
}

impl BatchSequence {
    /// Batches of `batch_size` examples taken from `corpus` in `order`.
    ///
    /// `layout` turns one chunk of example indices into a Batch; it
    /// runs each time a batch is pulled, so only one padded batch is
    /// alive at a time.
    pub fn new(corpus: Corpus, order: Vec<usize>, batch_size: usize, layout: BatchLayout) -> Self {
        Self { corpus, order, batch_size: batch_size.max(1), layout }
    }

    /// Number of batches one pass yields; the last may be short
    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Start (or restart) iteration from the first batch
    pub fn iter(&self) -> BatchIter<'_> {
        BatchIter { seq: self, chunks: self.order.chunks(self.batch_size) }
    }
}

impl<'a> IntoIterator for &'a BatchSequence {
    type Item     = Result<Batch>;
    type IntoIter = BatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct BatchIter<'a> {
    seq:    &'a BatchSequence,
    chunks: std::slice::Chunks<'a, usize>,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.chunks.next()?;
        Some((self.seq.layout)(&self.seq.corpus, indices))
    }
}
