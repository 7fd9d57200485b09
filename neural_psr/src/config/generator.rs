//! Beam generator configuration.

use burn::config::Config;

use psr_core::types::identity6;
use psr_core::{BaseDistribution, PHASE_SPACE_DIM};

use crate::error::NeuralPsrError;

/// Configuration of the learnable coordinate transform.
#[derive(Config, Debug)]
pub struct TransformConfig {
    /// Number of hidden `width → width` layers.
    #[config(default = 2)]
    pub n_hidden: usize,

    /// Hidden layer width.
    #[config(default = 20)]
    pub width: usize,

    /// Dropout probability after each hidden layer.
    #[config(default = 0.0)]
    pub dropout: f64,

    /// Factor applied to the network output (sets the physical scale).
    #[config(default = 1e-2)]
    pub output_scale: f64,

    /// Add the input to the scaled output (`x + s·f(x)`).
    #[config(default = false)]
    pub residual: bool,

    /// Start from a zero output layer, i.e. `f(x) = 0`.
    #[config(default = false)]
    pub zero_init_output: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformConfig {
    /// Residual transform initialised to the identity map.
    pub fn identity() -> Self {
        Self::new()
            .with_residual(true)
            .with_zero_init_output(true)
            .with_output_scale(1.0)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 {
            return Err("width must be > 0".into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if !self.output_scale.is_finite() {
            return Err("output_scale must be finite".into());
        }
        Ok(())
    }
}

/// Configuration of the beam generator: transform, base distribution and
/// ensemble size.
#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Reference momentum of generated beams [eV/c].
    pub p0c: f64,

    /// Learnable transform.
    #[config(default = "TransformConfig::new()")]
    pub transform: TransformConfig,

    /// Particles per forward pass.
    #[config(default = 10_000)]
    pub n_particles: usize,

    /// Base distribution mean.
    #[config(default = "vec![0.0; 6]")]
    pub base_mean: Vec<f64>,

    /// Base distribution covariance, row-major 6×6 (identity if unset).
    #[config(default = "None")]
    pub base_covariance: Option<Vec<f64>>,

    /// Draw a fresh base sample on every forward pass.
    #[config(default = true)]
    pub resample_each_forward: bool,

    /// Seed for weight initialisation and base sampling.
    #[config(default = 0)]
    pub seed: u64,
}

impl GeneratorConfig {
    /// Generator whose transform starts as the identity map.
    pub fn identity(p0c: f64) -> Self {
        Self::new(p0c).with_transform(TransformConfig::identity())
    }

    /// Build the base distribution.
    pub fn base_distribution(&self) -> crate::error::Result<BaseDistribution> {
        let covariance: Vec<f64> = match &self.base_covariance {
            Some(cov) => cov.clone(),
            None => identity6().iter().flatten().copied().collect(),
        };
        Ok(BaseDistribution::from_flat(&self.base_mean, &covariance)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.transform.validate()?;
        if self.n_particles < 2 {
            return Err(format!("n_particles must be >= 2, got {}", self.n_particles));
        }
        if self.p0c.is_nan() || self.p0c <= 0.0 {
            return Err(format!("p0c must be positive, got {}", self.p0c));
        }
        if self.base_mean.len() != PHASE_SPACE_DIM {
            return Err(format!("base_mean must have 6 entries, got {}", self.base_mean.len()));
        }
        Ok(())
    }

    pub(crate) fn checked(&self) -> crate::error::Result<()> {
        self.validate().map_err(NeuralPsrError::config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::new(10.0e6);
        assert_eq!(config.transform.n_hidden, 2);
        assert_eq!(config.transform.width, 20);
        assert!((config.transform.output_scale - 1e-2).abs() < 1e-12);
        assert_eq!(config.n_particles, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_identity_preset() {
        let config = GeneratorConfig::identity(1.0);
        assert!(config.transform.residual);
        assert!(config.transform.zero_init_output);
    }

    #[test]
    fn test_validation_errors() {
        assert!(GeneratorConfig::new(0.0).validate().is_err());
        assert!(GeneratorConfig::new(1.0).with_n_particles(1).validate().is_err());
        assert!(GeneratorConfig::new(1.0)
            .with_transform(TransformConfig::new().with_dropout(1.5))
            .validate()
            .is_err());
    }

    #[test]
    fn test_base_distribution_from_config() {
        let base = GeneratorConfig::new(1.0).base_distribution().unwrap();
        assert_eq!(base, BaseDistribution::standard());

        let mut cov = vec![0.0; 36];
        for i in 0..6 {
            cov[i * 6 + i] = 4.0;
        }
        let base = GeneratorConfig::new(1.0)
            .with_base_covariance(Some(cov))
            .base_distribution()
            .unwrap();
        assert!((base.scale_tril()[2][2] - 2.0).abs() < 1e-12);

        let bad = GeneratorConfig::new(1.0).with_base_covariance(Some(vec![0.0; 36]));
        assert!(bad.base_distribution().is_err());
    }
}
