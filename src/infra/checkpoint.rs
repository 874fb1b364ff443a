// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists a trained reader:
//
//   checkpoints/
//     resources.json          ← SharedResources (vocabularies + ReaderConfig)
//     model_epoch_N.mpk.gz    ← model weights after epoch N
//     latest_epoch.json       ← N of the most recent weights
//
// The resources are needed before the weights: they size the
// model (vocabulary × repr_dim) that load_record fills in.
//
// Burn's CompactRecorder serialises parameters to MessagePack
// and gzips them; loading fails if the architecture differs.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::ml::shared::SharedResources;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates `dir` (and parents) if it does not exist.
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Write vocabularies and reader config to resources.json.
    /// Must be saved alongside the weights: the model cannot be
    /// rebuilt without them.
    pub fn save_resources(&self, shared: &SharedResources) -> Result<()> {
        let path = self.dir.join("resources.json");
        fs::write(&path, serde_json::to_string_pretty(shared)?)
            .with_context(|| format!("Cannot write resources to '{}'", path.display()))?;
        tracing::debug!("Saved shared resources to '{}'", path.display());
        Ok(())
    }

    /// Read resources.json back. The vocabularies come back frozen.
    pub fn load_resources(&self) -> Result<SharedResources> {
        let path = self.dir.join("resources.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read resources from '{}'. Make sure you have run 'train' before 'ask'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json).with_context(|| format!("Malformed '{}'", path.display()))
    }

    /// Save model weights for `epoch` and point latest_epoch.json at them
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join("latest_epoch.json"), serde_json::to_string(&epoch)?)
            .context("Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest weights into `model`, which must have the
    /// saved architecture
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;
        Ok(model.load_record(record))
    }

    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");
        let s = fs::read_to_string(&path)
            .context("Cannot find 'latest_epoch.json'. Have you run 'train' first?")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
