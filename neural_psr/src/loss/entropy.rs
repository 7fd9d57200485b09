//! Differentiable entropy estimate of a particle sample.
//!
//! The entropy of the generated distribution is approximated by that of a
//! Gaussian with the same covariance, `½ ln det Σ + 3 ln(2πe)`. The
//! log-determinant goes through a Cholesky factorization of the correlation
//! matrix written with tensor ops, so gradients flow back into the sample.

use burn::prelude::*;
use burn::tensor::ElementConversion;

use psr_core::PHASE_SPACE_DIM;

/// Floor on Cholesky pivots of the correlation matrix.
const PIVOT_FLOOR: f64 = 1e-12;

/// Entropy and its ingredients, all `[1]` tensors.
#[derive(Debug, Clone)]
pub struct EntropyEstimate<B: Backend> {
    /// Differential entropy [nats].
    pub entropy: Tensor<B, 1>,
    /// `ln det Σ`.
    pub log_det: Tensor<B, 1>,
}

impl<B: Backend> EntropyEstimate<B> {
    /// 6-D emittance `sqrt(det Σ)` as a plain number.
    pub fn emittance(&self) -> f64 {
        let log_det: f64 = self.log_det.clone().into_scalar().elem();
        (0.5 * log_det).exp()
    }
}

/// Unbiased sample covariance of `[n, d]` samples, `[d, d]`.
pub fn sample_covariance<B: Backend>(samples: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, d] = samples.dims();
    let mean = samples.clone().mean_dim(0);
    let centered = samples - mean.expand([n, d]);
    centered
        .clone()
        .transpose()
        .matmul(centered)
        .div_scalar((n.max(2) - 1) as f64)
}

/// `ln det` of a symmetric positive-definite `[d, d]` matrix.
///
/// Factorizes the correlation matrix `D^-½ Σ D^-½` and adds back
/// `Σ ln Σᵢᵢ`; this keeps the factorization well conditioned when the
/// coordinates live on very different scales.
pub fn log_det_spd<B: Backend>(matrix: Tensor<B, 2>) -> Tensor<B, 1> {
    let [d, _] = matrix.dims();
    let entry = |i: usize, j: usize| matrix.clone().slice([i..i + 1, j..j + 1]).reshape([1]);

    let diag: Vec<Tensor<B, 1>> = (0..d).map(|i| entry(i, i)).collect();
    let inv_sqrt: Vec<Tensor<B, 1>> = diag.iter().map(|v| v.clone().sqrt().recip()).collect();

    let mut l: Vec<Vec<Option<Tensor<B, 1>>>> = vec![vec![None; d]; d];
    let mut log_det = diag
        .iter()
        .map(|v| v.clone().log())
        .reduce(|a, b| a + b)
        .unwrap_or_else(|| Tensor::zeros([1], &matrix.device()));

    for j in 0..d {
        // correlation matrix has a unit diagonal
        let mut pivot = Tensor::<B, 1>::ones([1], &matrix.device());
        for k in 0..j {
            if let Some(ljk) = &l[j][k] {
                pivot = pivot - ljk.clone().powf_scalar(2.0);
            }
        }
        let ljj = pivot.clamp_min(PIVOT_FLOOR).sqrt();
        log_det = log_det + ljj.clone().log().mul_scalar(2.0);

        for i in (j + 1)..d {
            let mut s = entry(i, j) * inv_sqrt[i].clone() * inv_sqrt[j].clone();
            for k in 0..j {
                if let (Some(lik), Some(ljk)) = (&l[i][k], &l[j][k]) {
                    s = s - lik.clone() * ljk.clone();
                }
            }
            l[i][j] = Some(s / ljj.clone());
        }
        l[j][j] = Some(ljj);
    }

    log_det
}

/// Gaussian entropy estimate of `[n, 6]` phase-space samples.
pub fn gaussian_entropy<B: Backend>(samples: Tensor<B, 2>) -> EntropyEstimate<B> {
    let log_det = log_det_spd(sample_covariance(samples));
    let constant = 0.5
        * PHASE_SPACE_DIM as f64
        * (2.0 * std::f64::consts::PI * std::f64::consts::E).ln();
    EntropyEstimate {
        entropy: log_det.clone().mul_scalar(0.5).add_scalar(constant),
        log_det,
    }
}
