//! Hooks into the training loop.

use std::path::Path;

use psr_io::{write_loss_log, LossRecord};

use crate::error::Result;
use crate::loss::LossComponents;

use super::EpochMetrics;

/// Receives training events. Every method defaults to doing nothing.
pub trait TrainingObserver {
    /// After every optimizer step.
    fn on_step(&mut self, _epoch: usize, _step: usize, _components: &LossComponents) {}

    /// When a step is skipped because the loss or its gradient was not
    /// finite.
    fn on_skipped_step(&mut self, _epoch: usize, _step: usize, _components: &LossComponents) {}

    /// At the end of every epoch.
    fn on_epoch(&mut self, _metrics: &EpochMetrics) {}

    /// After a snapshot was written to `path`.
    fn on_snapshot(&mut self, _epoch: usize, _path: &Path) {}
}

impl TrainingObserver for () {}

/// Append-only log of the loss components of every evaluation, skipped
/// steps included.
#[derive(Debug, Clone, Default)]
pub struct LossRecorder {
    records: Vec<LossRecord>,
}

impl LossRecorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded steps.
    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the log as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_loss_log(path, &self.records)?;
        Ok(())
    }
}

impl LossRecorder {
    fn push(&mut self, epoch: usize, step: usize, components: &LossComponents, skipped: bool) {
        self.records.push(LossRecord {
            epoch,
            step,
            loss: components.loss,
            image_loss: components.image_loss,
            entropy_loss: components.entropy_loss,
            emittance: components.emittance,
            lambda: components.lambda,
            skipped,
        });
    }

    /// Number of recorded evaluations whose step was skipped.
    pub fn n_skipped(&self) -> usize {
        self.records.iter().filter(|r| r.skipped).count()
    }
}

impl TrainingObserver for LossRecorder {
    fn on_step(&mut self, epoch: usize, step: usize, components: &LossComponents) {
        self.push(epoch, step, components, false);
    }

    fn on_skipped_step(&mut self, epoch: usize, step: usize, components: &LossComponents) {
        self.push(epoch, step, components, true);
    }
}

impl<A: TrainingObserver, B: TrainingObserver> TrainingObserver for (A, B) {
    fn on_step(&mut self, epoch: usize, step: usize, components: &LossComponents) {
        self.0.on_step(epoch, step, components);
        self.1.on_step(epoch, step, components);
    }

    fn on_skipped_step(&mut self, epoch: usize, step: usize, components: &LossComponents) {
        self.0.on_skipped_step(epoch, step, components);
        self.1.on_skipped_step(epoch, step, components);
    }

    fn on_epoch(&mut self, metrics: &EpochMetrics) {
        self.0.on_epoch(metrics);
        self.1.on_epoch(metrics);
    }

    fn on_snapshot(&mut self, epoch: usize, path: &Path) {
        self.0.on_snapshot(epoch, path);
        self.1.on_snapshot(epoch, path);
    }
}
