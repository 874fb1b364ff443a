// ============================================================
// Layer 6 — Training Hooks & Metrics
// ============================================================
// Built-in TrainingHook implementations:
//
//   LossHistory    — keeps every batch loss and one EpochMetrics
//                    row per epoch, in memory
//   LoggingHook    — reports progress through tracing
//   MetricsLogger  — appends one CSV row per epoch to disk
//
// Example CSV output (checkpoints/metrics.csv):
//   epoch,mean_loss,batches
//   1,0.812300,4
//   2,0.640100,4
//
// Hooks run synchronously after every gradient step, so they
// only do cheap bookkeeping; MetricsLogger touches disk once
// per epoch.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

use crate::domain::traits::TrainingHook;

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Average batch loss over the epoch
    pub mean_loss: f64,

    pub batches: usize,
}

impl EpochMetrics {
    pub fn new(epoch: usize, mean_loss: f64, batches: usize) -> Self {
        Self { epoch, mean_loss, batches }
    }
}

/// Running sum for the epoch in progress
#[derive(Debug, Clone, Default)]
struct EpochAccumulator {
    sum:     f64,
    batches: usize,
}

impl EpochAccumulator {
    fn add(&mut self, loss: f32) {
        self.sum += loss as f64;
        self.batches += 1;
    }

    fn finish(&mut self, epoch: usize) -> EpochMetrics {
        let mean = if self.batches > 0 { self.sum / self.batches as f64 } else { f64::NAN };
        let m = EpochMetrics::new(epoch, mean, self.batches);
        *self = Self::default();
        m
    }
}

// ─── LossHistory ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    losses:  Vec<(usize, f32)>,
    epochs:  Vec<EpochMetrics>,
    current: EpochAccumulator,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every (epoch, batch loss) pair, in order
    pub fn losses(&self) -> &[(usize, f32)] {
        &self.losses
    }

    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    /// Lowest epoch mean seen so far
    pub fn best(&self) -> Option<&EpochMetrics> {
        self.epochs
            .iter()
            .filter(|m| !m.mean_loss.is_nan())
            .min_by(|a, b| a.mean_loss.total_cmp(&b.mean_loss))
    }
}

impl TrainingHook for LossHistory {
    fn at_iteration_end(&mut self, epoch: usize, loss: f32) -> anyhow::Result<()> {
        self.losses.push((epoch, loss));
        self.current.add(loss);
        Ok(())
    }

    fn at_epoch_end(&mut self, epoch: usize) -> anyhow::Result<()> {
        self.epochs.push(self.current.finish(epoch));
        Ok(())
    }
}

// ─── LoggingHook ──────────────────────────────────────────────────────────────
/// Logs the epoch mean through tracing, plus every `every`-th
/// batch loss at debug level.
#[derive(Debug, Clone)]
pub struct LoggingHook {
    every:     usize,
    max_epoch: usize,
    iteration: usize,
    current:   EpochAccumulator,
}

impl LoggingHook {
    pub fn new(every: usize, max_epoch: usize) -> Self {
        Self { every: every.max(1), max_epoch, iteration: 0, current: EpochAccumulator::default() }
    }
}

impl TrainingHook for LoggingHook {
    fn at_iteration_end(&mut self, epoch: usize, loss: f32) -> anyhow::Result<()> {
        self.iteration += 1;
        self.current.add(loss);
        if self.iteration % self.every == 0 {
            tracing::debug!("Epoch {} iteration {}: loss={:.4}", epoch, self.iteration, loss);
        }
        Ok(())
    }

    fn at_epoch_end(&mut self, epoch: usize) -> anyhow::Result<()> {
        let m = self.current.finish(epoch);
        tracing::info!(
            "Epoch {:>3}/{} | mean_loss={:.4} | batches={}",
            m.epoch, self.max_epoch, m.mean_loss, m.batches,
        );
        Ok(())
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
    current:  EpochAccumulator,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,mean_loss,batches")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path, current: EpochAccumulator::default() })
    }

    /// Append one epoch's metrics as a new row
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;
        writeln!(f, "{},{:.6},{}", m.epoch, m.mean_loss, m.batches)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

impl TrainingHook for MetricsLogger {
    fn at_iteration_end(&mut self, _epoch: usize, loss: f32) -> anyhow::Result<()> {
        self.current.add(loss);
        Ok(())
    }

    fn at_epoch_end(&mut self, epoch: usize) -> anyhow::Result<()> {
        let m = self.current.finish(epoch);
        self.log(&m)
    }
}
