//! Training metrics and output types.

use burn::prelude::*;

use crate::beam::ParticleEnsemble;
use crate::loss::LossComponents;

/// Loss components averaged over the steps of one epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochMetrics {
    /// Epoch index (1-based).
    pub epoch: usize,
    /// Total number of epochs.
    pub n_epochs: usize,
    /// Mean total loss.
    pub loss: f64,
    /// Mean image divergence.
    pub image_loss: f64,
    /// Mean entropy term.
    pub entropy_loss: f64,
    /// Mean 6-D emittance.
    pub emittance: f64,
    /// λ after the last step.
    pub lambda: f64,
    /// Optimizer steps taken.
    pub steps: usize,
    /// Steps skipped on a non-finite loss.
    pub skipped: usize,
}

impl EpochMetrics {
    /// Log the metrics at info level.
    pub fn log(&self, prefix: &str) {
        log::info!(
            "{}Epoch {}/{}: loss = {:.6} image = {:.6e} entropy = {:.6} emittance = {:.3e} lambda = {:.3e}",
            prefix,
            self.epoch,
            self.n_epochs,
            self.loss,
            self.image_loss,
            self.entropy_loss,
            self.emittance,
            self.lambda,
        );
    }
}

/// Running sums for [`EpochMetrics`].
#[derive(Debug, Clone, Default)]
pub(crate) struct EpochAccumulator {
    sum: [f64; 4],
    lambda: f64,
    steps: usize,
    skipped: usize,
}

impl EpochAccumulator {
    pub(crate) fn add(&mut self, components: &LossComponents) {
        self.sum[0] += components.loss;
        self.sum[1] += components.image_loss;
        self.sum[2] += components.entropy_loss;
        self.sum[3] += components.emittance;
        self.lambda = components.lambda;
        self.steps += 1;
    }

    pub(crate) fn skip(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn finish(self, epoch: usize, n_epochs: usize, lambda: f64) -> EpochMetrics {
        let n = self.steps.max(1) as f64;
        EpochMetrics {
            epoch,
            n_epochs,
            loss: self.sum[0] / n,
            image_loss: self.sum[1] / n,
            entropy_loss: self.sum[2] / n,
            emittance: self.sum[3] / n,
            lambda: if self.steps > 0 { self.lambda } else { lambda },
            steps: self.steps,
            skipped: self.skipped,
        }
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutput<B: Backend> {
    /// Reconstructed beam sampled from the final generator.
    pub beam: ParticleEnsemble<B>,
    /// `(epoch, mean loss)` at every log interval.
    pub history: Vec<(usize, f64)>,
    /// Steps skipped on a non-finite loss.
    pub skipped_steps: usize,
    /// Optimizer steps taken.
    pub total_steps: usize,
    /// Final λ.
    pub lambda: f64,
}
