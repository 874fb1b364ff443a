// ============================================================
// Layer 5 — Span Extraction Loss (XQA)
// ============================================================
// Cross-entropy over start and end positions for extractive
// QA, where one question may have several gold spans:
//
//   per answer a:   ce(start[q(a)], s_a) + ce(end[q(a)], e_a)
//   per question q: min over its answers   (empty → 0)
//   loss:           mean over questions 0..=max q(a)
//
// Questions after the last one that owns an answer form no
// segment at all, so they do not dilute the mean.
//
// Taking the minimum means the model is rewarded for finding
// any one of the gold spans, not all of them.
//
// When there is exactly one answer per question the score rows
// already line up with the answers and are used directly;
// otherwise each answer gathers its question's rows first.

use burn::prelude::*;
use burn::tensor::{activation, TensorData};

use crate::data::batcher::Batch;
use crate::data::ports::{check_provided, input, prediction, target, DataPort, LOSS};
use crate::domain::error::{ReaderError, Result};
use crate::ml::binding::{int_tensor_2d, PortTensor, PortTensors};

/// Ports read by `xqa_training_output`
pub fn xqa_training_input_ports() -> Vec<DataPort> {
    vec![
        prediction::START_SCORES,
        prediction::END_SCORES,
        target::ANSWER_SPAN,
        input::ANSWER_TO_QUESTION,
    ]
}

/// Min-over-answers cross-entropy.
///
/// * `start_scores`, `end_scores` - [Q, L] logits
/// * `answer_span`                - [A, 2] inclusive (start, end) positions
/// * `answer_to_question`         - owning question of each answer, length A
pub fn xqa_min_crossentropy_loss<B: Backend>(
    start_scores:       Tensor<B, 2>,
    end_scores:         Tensor<B, 2>,
    answer_span:        Tensor<B, 2, Int>,
    answer_to_question: &[usize],
) -> Result<Tensor<B, 1>> {
    let [q, len] = start_scores.dims();
    if end_scores.dims() != [q, len] {
        return Err(ReaderError::shape(format!(
            "start scores {:?} vs end scores {:?}", [q, len], end_scores.dims()
        )));
    }
    let [a, width] = answer_span.dims();
    if width != 2 {
        return Err(ReaderError::shape(format!("answer span must be [A, 2], got [{}, {}]", a, width)));
    }
    if answer_to_question.len() != a {
        return Err(ReaderError::shape(format!(
            "{} answer spans but {} answer→question entries", a, answer_to_question.len()
        )));
    }
    if let Some(bad) = answer_to_question.iter().find(|&&i| i >= q) {
        return Err(ReaderError::shape(format!("answer points at question {} of {}", bad, q)));
    }

    let device = start_scores.device();
    if a == 0 {
        return Ok(Tensor::zeros([1], &device));
    }

    let is_aligned = q == a;
    let (start_rows, end_rows) = if is_aligned {
        (start_scores, end_scores)
    } else {
        let owners: Vec<i64> = answer_to_question.iter().map(|&i| i as i64).collect();
        let owners = Tensor::<B, 1, Int>::from_data(TensorData::new(owners, [a]), &device);
        (start_scores.select(0, owners.clone()), end_scores.select(0, owners))
    };

    let starts = answer_span.clone().slice([0..a, 0..1]);
    let ends   = answer_span.slice([0..a, 1..2]);

    let start_ce = activation::log_softmax(start_rows, 1).gather(1, starts).neg();
    let end_ce   = activation::log_softmax(end_rows, 1).gather(1, ends).neg();
    let per_answer = (start_ce + end_ce).reshape([a]);

    let num_segments = answer_to_question.iter().max().map_or(0, |&m| m + 1);
    Ok(segment_min_mean(per_answer, answer_to_question, num_segments))
}

/// Minimum of `values` within each of `num_segments` segments,
/// then the mean over segments. Empty segments count as 0.
pub fn segment_min_mean<B: Backend>(
    values:       Tensor<B, 1>,
    segments:     &[usize],
    num_segments: usize,
) -> Tensor<B, 1> {
    let device = values.device();
    let [n] = values.dims();

    let mut outside = Vec::with_capacity(num_segments * n);
    let mut empty   = Vec::with_capacity(num_segments);
    for s in 0..num_segments {
        outside.extend(segments.iter().map(|&owner| owner != s));
        empty.push(!segments.contains(&s));
    }
    let outside = Tensor::<B, 2, Bool>::from_data(TensorData::new(outside, [num_segments, n]), &device);
    let empty   = Tensor::<B, 2, Bool>::from_data(TensorData::new(empty, [num_segments, 1]), &device);

    values
        .reshape([1, n])
        .expand([num_segments, n])
        .mask_fill(outside, f32::INFINITY)
        .min_dim(1)
        .mask_fill(empty, 0.0)
        .reshape([num_segments])
        .mean()
}

/// Bind the XQA loss to its ports: START_SCORES and END_SCORES
/// from `outputs`, ANSWER_SPAN and ANSWER_TO_QUESTION from `batch`.
///
/// Every missing port is reported in one DataContract error.
pub fn xqa_training_output<B: Backend>(
    outputs: &PortTensors<B>,
    batch:   &Batch,
    device:  &B::Device,
) -> Result<PortTensors<B>> {
    let available: Vec<DataPort> = outputs.ports().into_iter().chain(batch.ports()).collect();
    check_provided(&available, &xqa_training_input_ports())?;

    let start = outputs.matrix(&prediction::START_SCORES)?;
    let end   = outputs.matrix(&prediction::END_SCORES)?;

    let spans = batch.int(&target::ANSWER_SPAN)?;
    target::ANSWER_SPAN.check_shape(spans.shape())?;
    let len = start.dims()[1] as i64;
    if let Some(bad) = spans.data().iter().find(|&&p| p < 0 || p >= len) {
        return Err(ReaderError::shape(format!("span position {} outside {} tokens", bad, len)));
    }

    let owners: Vec<usize> = batch
        .int(&input::ANSWER_TO_QUESTION)?
        .data()
        .iter()
        .map(|&i| usize::try_from(i))
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| ReaderError::shape("negative answer→question index"))?;

    let loss = xqa_min_crossentropy_loss(start, end, int_tensor_2d::<B>(spans, device)?, &owners)?;

    let mut out = PortTensors::new();
    out.push(LOSS, PortTensor::Vector(loss));
    Ok(out)
}
