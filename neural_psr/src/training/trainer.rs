//! MENT reconstruction trainer.

use std::path::{Path, PathBuf};

use burn::grad_clipping::GradientClippingConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;

use psr_io::{save_beam, snapshot_path};

use crate::beam::{BeamGenerator, ParticleEnsemble};
use crate::config::{NonFinitePolicy, TrainingConfig};
use crate::data::ScanDataset;
use crate::error::{NeuralPsrError, Result};
use crate::lattice::{Lattice, Transport};
use crate::loss::MentLoss;
use crate::model::ReconstructionModel;
use crate::screen::{KdeScreen, Screen};

use super::checkpoint::{checkpoint_dir, save_checkpoint, CheckpointMetadata};
use super::finite::{grads_are_finite, params_are_finite};
use super::metrics::{EpochAccumulator, EpochMetrics, TrainOutput};
use super::observer::{LossRecorder, TrainingObserver};
use super::parallel::evaluate_batch;
use super::ScanBatcher;

/// Fits a reconstruction model to a scan dataset.
///
/// Every step draws a fresh beam, predicts the images of one mini-batch,
/// evaluates `-entropy + λ · image_loss` and takes one Adam step on the
/// generator. Non-finite losses, gradients and updated parameters are
/// handled by the configured [`NonFinitePolicy`].
#[derive(Debug)]
pub struct ReconstructionTrainer<B: AutodiffBackend, T = Lattice, S = KdeScreen> {
    model: ReconstructionModel<B, T, S>,
    loss: MentLoss,
    config: TrainingConfig,
}

impl<B, T, S> ReconstructionTrainer<B, T, S>
where
    B: AutodiffBackend,
    T: Transport<B>,
    S: Screen<B>,
{
    /// Create a trainer for `model`.
    pub fn new(model: ReconstructionModel<B, T, S>, config: TrainingConfig) -> Result<Self> {
        config.validate().map_err(NeuralPsrError::config)?;
        let loss = MentLoss::new(config.loss.clone())?;
        Ok(Self {
            model,
            loss,
            config,
        })
    }

    /// Training configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// The model being trained.
    pub fn model(&self) -> &ReconstructionModel<B, T, S> {
        &self.model
    }

    /// Consume the trainer, returning the trained model.
    pub fn into_model(self) -> ReconstructionModel<B, T, S> {
        self.model
    }

    /// The loss, including the current λ.
    pub fn loss(&self) -> &MentLoss {
        &self.loss
    }

    fn check_dataset(&self, dataset: &ScanDataset<B>) -> Result<()> {
        if dataset.is_empty() {
            return Err(NeuralPsrError::EmptyDataset);
        }
        let [ny, nx] = self.model.resolution();
        let expected = [self.model.n_screens(), self.model.knobs().len(), ny, nx];
        let got = {
            let [dy, dx] = dataset.resolution();
            [dataset.n_screens(), dataset.n_knobs(), dy, dx]
        };
        if expected != got {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: expected.to_vec(),
                got: got.to_vec(),
            });
        }
        Ok(())
    }

    /// Train on `dataset`, reporting to `observer`.
    pub fn fit<O: TrainingObserver>(
        &mut self,
        dataset: &ScanDataset<B>,
        observer: &mut O,
    ) -> Result<TrainOutput<B>> {
        self.check_dataset(dataset)?;
        let dataset = dataset.clone().to_device(self.model.context().device());

        let mut optimizer_config = AdamConfig::new()
            .with_beta_1(self.config.adam_beta_1)
            .with_beta_2(self.config.adam_beta_2)
            .with_epsilon(self.config.adam_epsilon);
        if self.config.gradient_clip > 0.0 {
            optimizer_config = optimizer_config.with_grad_clipping(Some(
                GradientClippingConfig::Norm(self.config.gradient_clip as f32),
            ));
        }
        let mut optimizer = optimizer_config.init::<B, BeamGenerator<B>>();

        let mut batcher =
            ScanBatcher::new(self.config.batch_size, self.config.shuffle, self.config.seed);
        let mut recorder = LossRecorder::new();
        let n_epochs = self.config.n_epochs;
        let log_interval = self.config.log_interval.max(1);

        let mut history = Vec::new();
        let mut step = 0;
        let mut total_steps = 0;
        let mut skipped_steps = 0;

        log::info!(
            "Training on {} configurations for {} epochs ({} particles, batch size {})",
            dataset.len(),
            n_epochs,
            self.model.n_particles(),
            self.config.batch_size
        );

        for epoch in 1..=n_epochs {
            let mut epoch_metrics = EpochAccumulator::default();

            for indices in batcher.epoch(dataset.len()) {
                step += 1;
                let batch = dataset.select(&indices)?;
                let base = self.model.draw_base();
                let output = evaluate_batch(&self.model, &self.loss, base, &batch)?;
                let components = output.components;

                if !components.is_finite() {
                    match self.config.non_finite {
                        NonFinitePolicy::Abort => {
                            return Err(NeuralPsrError::NonFiniteLoss {
                                epoch,
                                step,
                                value: components.loss,
                            });
                        }
                        NonFinitePolicy::Skip => {
                            log::warn!(
                                "Skipping step {} of epoch {}: non-finite loss {}",
                                step,
                                epoch,
                                components.loss
                            );
                            skipped_steps += 1;
                            epoch_metrics.skip();
                            recorder.on_skipped_step(epoch, step, &components);
                            observer.on_skipped_step(epoch, step, &components);
                            continue;
                        }
                    }
                }

                let grads = output.loss.backward();
                let grads = GradientsParams::from_grads(grads, self.model.generator());
                let stepped = grads_are_finite(self.model.generator(), &grads).then(|| {
                    optimizer.step(
                        self.config.learning_rate,
                        self.model.generator().clone(),
                        grads,
                    )
                });

                match stepped {
                    Some(generator) if params_are_finite(&generator) => {
                        self.model.set_generator(generator);
                    }
                    _ => match self.config.non_finite {
                        NonFinitePolicy::Abort => {
                            return Err(NeuralPsrError::NonFiniteGradient { epoch, step });
                        }
                        NonFinitePolicy::Skip => {
                            // the generator keeps its pre-step parameters
                            log::warn!(
                                "Skipping step {} of epoch {}: non-finite gradient",
                                step,
                                epoch
                            );
                            skipped_steps += 1;
                            epoch_metrics.skip();
                            recorder.on_skipped_step(epoch, step, &components);
                            observer.on_skipped_step(epoch, step, &components);
                            continue;
                        }
                    },
                }
                self.loss.update_multiplier(components.image_loss)?;

                total_steps += 1;
                epoch_metrics.add(&components);
                recorder.on_step(epoch, step, &components);
                observer.on_step(epoch, step, &components);
            }

            let metrics = epoch_metrics.finish(epoch, n_epochs, self.loss.lambda());
            observer.on_epoch(&metrics);
            if epoch % log_interval == 0 || epoch == n_epochs {
                metrics.log("");
                history.push((epoch, metrics.loss));
            }

            let every = self.config.checkpoint.snapshot_every;
            if every > 0 && epoch % every == 0 {
                let path = self.write_snapshot(&metrics, total_steps)?;
                observer.on_snapshot(epoch, &path);
            }
        }

        let beam = self.model.sample_beam(self.model.n_particles())?;
        self.write_outputs(&beam, &recorder)?;

        Ok(TrainOutput {
            beam,
            history,
            skipped_steps,
            total_steps,
            lambda: self.loss.lambda(),
        })
    }

    fn output_dir(&self) -> Result<&Path> {
        self.config
            .checkpoint
            .output_dir
            .as_deref()
            .map(Path::new)
            .ok_or_else(|| NeuralPsrError::config("no output_dir configured"))
    }

    /// Sample a snapshot of the current model and write it to disk.
    fn write_snapshot(&self, metrics: &EpochMetrics, total_steps: usize) -> Result<PathBuf> {
        let checkpoint = &self.config.checkpoint;
        let dir = self.output_dir()?;
        let snapshot = self.model.snapshot();

        let beam = snapshot.sample_beam(checkpoint.snapshot_particles)?;
        let path = snapshot_path(dir, &checkpoint.snapshot_prefix, metrics.epoch);
        save_beam(&path, &beam.to_dump()?)?;
        log::debug!("Wrote {} particle snapshot to {:?}", beam.len(), path);

        if checkpoint.save_generator {
            let metadata =
                CheckpointMetadata::new(metrics.epoch, total_steps, metrics.loss, metrics.lambda);
            save_checkpoint(
                &checkpoint_dir(dir, metrics.epoch),
                snapshot.generator(),
                &self.config,
                &metadata,
            )?;
        }
        Ok(path)
    }

    fn write_outputs(&self, beam: &ParticleEnsemble<B>, recorder: &LossRecorder) -> Result<()> {
        let checkpoint = &self.config.checkpoint;
        if let Some(file) = &checkpoint.final_beam_file {
            let path = self.output_dir()?.join(file);
            save_beam(&path, &beam.to_dump()?)?;
        }
        if let Some(file) = &checkpoint.loss_log_file {
            recorder.save(&self.output_dir()?.join(file))?;
        }
        Ok(())
    }
}
