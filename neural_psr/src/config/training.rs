//! Training configuration types.

use burn::config::Config;
use serde::{Deserialize, Serialize};

use super::GeneratorConfig;

/// What to do when a loss evaluates to NaN or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NonFinitePolicy {
    /// Skip the optimizer step, log a warning and continue.
    #[default]
    Skip,
    /// Stop training with an error.
    Abort,
}

/// Configuration of the MENT loss `-entropy + λ · image_loss`.
#[derive(Config, Debug)]
pub struct MentLossConfig {
    /// Initial (or fixed) Lagrange multiplier λ.
    #[config(default = 1e11)]
    pub lambda: f64,

    /// Adapt λ by dual ascent after every step.
    #[config(default = false)]
    pub trainable_lambda: bool,

    /// Image loss the adaptive multiplier drives towards.
    #[config(default = 0.0)]
    pub target_residual: f64,

    /// Dual ascent step on `ln λ`.
    #[config(default = 1e-2)]
    pub lambda_step: f64,

    /// Lower bound on λ.
    #[config(default = 1e-12)]
    pub lambda_min: f64,

    /// Upper bound on λ.
    #[config(default = 1e20)]
    pub lambda_max: f64,

    /// Offset inside the image-divergence logarithms.
    #[config(default = 1e-10)]
    pub eps: f64,
}

impl Default for MentLossConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MentLossConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(format!("lambda must be positive and finite, got {}", self.lambda));
        }
        if !(self.lambda_min > 0.0 && self.lambda_min <= self.lambda_max) {
            return Err(format!(
                "lambda bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.lambda_min, self.lambda_max
            ));
        }
        if self.eps <= 0.0 {
            return Err("eps must be positive".into());
        }
        Ok(())
    }
}

/// Periodic snapshot and output configuration.
#[derive(Config, Debug)]
pub struct CheckpointConfig {
    /// Directory receiving snapshots, checkpoints and the final beam.
    #[config(default = "None")]
    pub output_dir: Option<String>,

    /// Snapshot every this many epochs (0 disables snapshots).
    #[config(default = 0)]
    pub snapshot_every: usize,

    /// Particles per snapshot.
    #[config(default = 100_000)]
    pub snapshot_particles: usize,

    /// File name prefix of snapshots (`{prefix}_{epoch}.npz`).
    #[config(default = "String::from(\"dist\")")]
    pub snapshot_prefix: String,

    /// Also write a generator checkpoint next to every snapshot.
    #[config(default = false)]
    pub save_generator: bool,

    /// File name of the final beam inside `output_dir`.
    #[config(default = "None")]
    pub final_beam_file: Option<String>,

    /// File name of the loss log inside `output_dir`.
    #[config(default = "None")]
    pub loss_log_file: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the reconstruction trainer.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Generator configuration.
    pub generator: GeneratorConfig,

    /// Loss configuration.
    #[config(default = "MentLossConfig::new()")]
    pub loss: MentLossConfig,

    /// Snapshot and output configuration.
    #[config(default = "CheckpointConfig::new()")]
    pub checkpoint: CheckpointConfig,

    /// Adam exponential decay of the first moment.
    #[config(default = 0.9)]
    pub adam_beta_1: f32,

    /// Adam exponential decay of the second moment.
    #[config(default = 0.999)]
    pub adam_beta_2: f32,

    /// Adam denominator offset.
    #[config(default = 1e-5)]
    pub adam_epsilon: f32,

    /// Learning rate.
    #[config(default = 1e-2)]
    pub learning_rate: f64,

    /// Number of epochs.
    #[config(default = 100)]
    pub n_epochs: usize,

    /// Scan configurations per mini-batch.
    #[config(default = 10)]
    pub batch_size: usize,

    /// Reshuffle configurations every epoch.
    #[config(default = true)]
    pub shuffle: bool,

    /// Seed for mini-batch shuffling.
    #[config(default = 42)]
    pub seed: u64,

    /// Log progress every this many epochs.
    #[config(default = 100)]
    pub log_interval: usize,

    /// Gradient clipping threshold on the L2 norm (0 = no clipping).
    #[config(default = 0.0)]
    pub gradient_clip: f64,

    /// Handling of non-finite losses.
    #[config(default = "NonFinitePolicy::Skip")]
    pub non_finite: NonFinitePolicy,
}

impl TrainingConfig {
    /// Settings of the published quad-scan reconstructions: Adam at 0.01,
    /// λ = 1e11, ten configurations per batch, progress every 100 epochs.
    pub fn quad_scan(generator: GeneratorConfig, n_epochs: usize) -> Self {
        Self::new(generator)
            .with_n_epochs(n_epochs)
            .with_learning_rate(0.01)
            .with_batch_size(10)
    }

    /// Settings of the 3D scans: snapshots of 100 000 particles every
    /// 1000 epochs into `output_dir`.
    pub fn scan_3d(generator: GeneratorConfig, n_epochs: usize, output_dir: &str) -> Self {
        Self::quad_scan(generator, n_epochs).with_checkpoint(
            CheckpointConfig::new()
                .with_output_dir(Some(output_dir.to_string()))
                .with_snapshot_every(1000)
                .with_snapshot_particles(100_000),
        )
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.generator.validate()?;
        self.loss.validate()?;
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".into());
        }
        if self.learning_rate <= 0.0 {
            return Err("learning_rate must be positive".into());
        }
        if !((0.0..1.0).contains(&self.adam_beta_1) && (0.0..1.0).contains(&self.adam_beta_2)) {
            return Err(format!(
                "Adam betas must be in [0, 1), got ({}, {})",
                self.adam_beta_1, self.adam_beta_2
            ));
        }
        if self.adam_epsilon <= 0.0 {
            return Err("adam_epsilon must be positive".into());
        }
        if self.checkpoint.snapshot_every > 0 && self.checkpoint.output_dir.is_none() {
            return Err("snapshots requested without an output_dir".into());
        }
        let writes_files = self.checkpoint.final_beam_file.is_some()
            || self.checkpoint.loss_log_file.is_some();
        if writes_files && self.checkpoint.output_dir.is_none() {
            return Err("output files requested without an output_dir".into());
        }
        if self.checkpoint.snapshot_every > 0 && self.checkpoint.snapshot_particles < 2 {
            return Err("snapshot_particles must be >= 2".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_defaults() {
        let config = TrainingConfig::new(GeneratorConfig::new(10.0e6));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.log_interval, 100);
        assert!((config.loss.lambda - 1e11).abs() < 1.0);
        assert_eq!(config.non_finite, NonFinitePolicy::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scan_3d_preset() {
        let config = TrainingConfig::scan_3d(GeneratorConfig::new(1.0), 3000, "/tmp/run");
        assert_eq!(config.checkpoint.snapshot_every, 1000);
        assert_eq!(config.checkpoint.snapshot_particles, 100_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_snapshot_without_dir_is_invalid() {
        let config = TrainingConfig::new(GeneratorConfig::new(1.0))
            .with_checkpoint(CheckpointConfig::new().with_snapshot_every(10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_adam_settings_validated() {
        let config = TrainingConfig::new(GeneratorConfig::new(1.0));
        assert!((config.adam_beta_1 - 0.9).abs() < 1e-6);
        assert!(config.clone().with_adam_beta_2(1.0).validate().is_err());
        assert!(config.with_adam_epsilon(0.0).validate().is_err());
    }

    #[test]
    fn test_config_debug_lists_fields() {
        let config = TrainingConfig::new(GeneratorConfig::new(1.0)).with_n_epochs(3);
        let text = format!("{:?}", config);
        assert!(text.contains("n_epochs: 3"));
        assert!(text.contains("adam_beta_1"));
    }

    #[test]
    fn test_loss_config_validation() {
        assert!(MentLossConfig::new().with_lambda(0.0).validate().is_err());
        assert!(MentLossConfig::new()
            .with_lambda_min(10.0)
            .with_lambda_max(1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = TrainingConfig::new(GeneratorConfig::new(5.0e6)).with_n_epochs(7);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.n_epochs, 7);
        assert_eq!(parsed.generator.p0c, 5.0e6);
        assert_eq!(parsed.non_finite, NonFinitePolicy::Skip);
    }
}
