//! Image divergence.

use burn::prelude::*;

use crate::error::{NeuralPsrError, Result};

/// Repeat predicted images `[C, S, ny, nx]` over the repeated-measurement
/// axis of `measured` `[C, S, R, ny, nx]`.
pub fn broadcast_repeats<B: Backend>(
    predicted: Tensor<B, 4>,
    measured_dims: [usize; 5],
) -> Result<Tensor<B, 5>> {
    let [c, s, ny, nx] = predicted.dims();
    let [mc, ms, r, mny, mnx] = measured_dims;
    if (c, s, ny, nx) != (mc, ms, mny, mnx) {
        return Err(NeuralPsrError::ShapeMismatch {
            expected: vec![mc, ms, mny, mnx],
            got: vec![c, s, ny, nx],
        });
    }
    Ok(predicted.unsqueeze_dim::<5>(2).expand([c, s, r, ny, nx]))
}

/// Generalized KL divergence `Σ t · |ln(t + ε) − ln(p + ε)|`.
///
/// Summed over every pixel of every image; both inputs are expected to be
/// normalized per image. Zero exactly when the images agree.
pub fn image_divergence<B: Backend, const D: usize>(
    measured: Tensor<B, D>,
    predicted: Tensor<B, D>,
    eps: f64,
) -> Tensor<B, 1> {
    let log_ratio = measured.clone().add_scalar(eps).log() - predicted.add_scalar(eps).log();
    (measured * log_ratio.abs()).sum()
}
