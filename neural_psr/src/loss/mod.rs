//! Loss functions for MENT reconstruction.
//!
//! - Image divergence: generalized KL between measured and predicted images
//! - Entropy: Gaussian entropy estimate of the generated sample
//! - MENT loss: `-entropy + λ · image_loss` with a fixed or adaptive λ

mod divergence;
mod entropy;
mod ment;

pub use divergence::{broadcast_repeats, image_divergence};
pub use entropy::{gaussian_entropy, log_det_spd, sample_covariance, EntropyEstimate};
pub use ment::{LagrangeMultiplier, LossComponents, LossOutput, MentLoss};
