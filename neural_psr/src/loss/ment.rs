//! Entropy-regularized image matching.

use burn::prelude::*;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};

use super::{broadcast_repeats, gaussian_entropy, image_divergence, EntropyEstimate};
use crate::config::MentLossConfig;
use crate::error::{NeuralPsrError, Result};

/// Lagrange multiplier weighting the image term.
#[derive(Debug, Clone, PartialEq)]
pub enum LagrangeMultiplier {
    /// Constant λ.
    Fixed(f64),
    /// λ updated by dual ascent on `ln λ` after every step.
    Adaptive {
        /// Current value.
        value: f64,
        /// Image loss the update drives towards.
        target: f64,
        /// Step size on `ln λ`.
        step: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

impl LagrangeMultiplier {
    /// Build the multiplier described by a loss configuration.
    pub fn from_config(config: &MentLossConfig) -> Self {
        if config.trainable_lambda {
            LagrangeMultiplier::Adaptive {
                value: config.lambda.clamp(config.lambda_min, config.lambda_max),
                target: config.target_residual,
                step: config.lambda_step,
                min: config.lambda_min,
                max: config.lambda_max,
            }
        } else {
            LagrangeMultiplier::Fixed(config.lambda)
        }
    }

    /// Current λ.
    pub fn value(&self) -> f64 {
        match self {
            LagrangeMultiplier::Fixed(value) => *value,
            LagrangeMultiplier::Adaptive { value, .. } => *value,
        }
    }

    /// Whether λ can change during training.
    pub fn is_adaptive(&self) -> bool {
        matches!(self, LagrangeMultiplier::Adaptive { .. })
    }

    /// Dual-ascent update `ln λ += step · (image_loss − target)`.
    ///
    /// Non-finite image losses leave λ unchanged. Returns the new value.
    pub fn update(&mut self, image_loss: f64) -> f64 {
        if let LagrangeMultiplier::Adaptive {
            value,
            target,
            step,
            min,
            max,
        } = self
        {
            if image_loss.is_finite() {
                let log_lambda = value.ln() + *step * (image_loss - *target);
                *value = log_lambda.exp().clamp(*min, *max);
            }
        }
        self.value()
    }

    /// Check that λ is strictly positive and finite.
    pub fn check(&self) -> Result<()> {
        let value = self.value();
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(NeuralPsrError::InvalidMultiplier { value })
        }
    }
}

/// Detached loss components of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossComponents {
    /// Total loss.
    pub loss: f64,
    /// Image divergence summed over the batch.
    pub image_loss: f64,
    /// Entropy term as it enters the loss (`-entropy`).
    pub entropy_loss: f64,
    /// 6-D emittance `sqrt(det Σ)` of the sample.
    pub emittance: f64,
    /// λ used for this evaluation.
    pub lambda: f64,
}

impl LossComponents {
    /// Whether the total loss is a finite number.
    pub fn is_finite(&self) -> bool {
        self.loss.is_finite()
    }
}

/// Differentiable loss plus its detached components.
#[derive(Debug, Clone)]
pub struct LossOutput<B: Backend> {
    /// Scalar loss `[1]`.
    pub loss: Tensor<B, 1>,
    /// Detached components.
    pub components: LossComponents,
}

/// MENT loss `-entropy + λ · image_loss`.
#[derive(Debug, Clone)]
pub struct MentLoss {
    config: MentLossConfig,
    multiplier: LagrangeMultiplier,
}

impl MentLoss {
    /// Create a loss from a validated configuration.
    pub fn new(config: MentLossConfig) -> Result<Self> {
        config.validate().map_err(NeuralPsrError::config)?;
        let multiplier = LagrangeMultiplier::from_config(&config);
        Ok(Self { config, multiplier })
    }

    /// Configuration.
    pub fn config(&self) -> &MentLossConfig {
        &self.config
    }

    /// Lagrange multiplier.
    pub fn multiplier(&self) -> &LagrangeMultiplier {
        &self.multiplier
    }

    /// Current λ.
    pub fn lambda(&self) -> f64 {
        self.multiplier.value()
    }

    /// Image divergence between predicted and measured images.
    ///
    /// predicted: [C, S, ny, nx]
    /// measured: [C, S, R, ny, nx]
    /// Output: [1]
    pub fn image_loss<B: Backend>(
        &self,
        predicted: Tensor<B, 4>,
        measured: Tensor<B, 5>,
    ) -> Result<Tensor<B, 1>> {
        let predicted = broadcast_repeats(predicted, measured.dims())?;
        Ok(image_divergence(measured, predicted, self.config.eps))
    }

    /// Evaluate the loss.
    ///
    /// predicted: [C, S, ny, nx]
    /// measured: [C, S, R, ny, nx]
    /// beam: [N, 6] sample the images were formed from
    pub fn evaluate<B: Backend>(
        &self,
        predicted: Tensor<B, 4>,
        measured: Tensor<B, 5>,
        beam: Tensor<B, 2>,
    ) -> Result<LossOutput<B>> {
        let image_loss = self.image_loss(predicted, measured)?;
        Ok(self.combine(gaussian_entropy(beam), image_loss))
    }

    /// Assemble `-entropy + λ · image_loss` from precomputed terms.
    ///
    /// The image term is additive over configurations, so a batch split
    /// into shards combines as the sum of the shard image losses.
    pub fn combine<B: Backend>(
        &self,
        estimate: EntropyEstimate<B>,
        image_loss: Tensor<B, 1>,
    ) -> LossOutput<B> {
        let lambda = self.lambda();

        let entropy_loss = estimate.entropy.clone().neg();
        let loss = entropy_loss.clone() + image_loss.clone().mul_scalar(lambda);

        let components = LossComponents {
            loss: loss.clone().into_scalar().elem(),
            image_loss: image_loss.into_scalar().elem(),
            entropy_loss: entropy_loss.into_scalar().elem(),
            emittance: estimate.emittance(),
            lambda,
        };

        LossOutput { loss, components }
    }

    /// Advance an adaptive λ after an optimizer step.
    pub fn update_multiplier(&mut self, image_loss: f64) -> Result<f64> {
        let value = self.multiplier.update(image_loss);
        self.multiplier.check()?;
        Ok(value)
    }
}
