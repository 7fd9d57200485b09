//! Gaussian base distribution for the beam generator.
//!
//! The generator never learns this distribution. It only draws i.i.d.
//! samples from it and pushes them through a learnable transform.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::PsrCoreError;
use crate::linalg::{cholesky, lower_mul};
use crate::types::{identity6, Matrix6, Vector6, PHASE_SPACE_DIM};

/// Multivariate normal distribution in 6-D phase space.
///
/// Stored as a mean and the lower Cholesky factor of the covariance, so a
/// sample is `mean + L ξ` with `ξ ~ N(0, I)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseDistribution {
    mean: Vector6,
    scale_tril: Matrix6,
}

impl Default for BaseDistribution {
    fn default() -> Self {
        Self::standard()
    }
}

impl BaseDistribution {
    /// Zero-mean, identity-covariance Gaussian.
    pub fn standard() -> Self {
        Self {
            mean: [0.0; PHASE_SPACE_DIM],
            scale_tril: identity6(),
        }
    }

    /// Gaussian with the given mean and covariance.
    ///
    /// # Errors
    /// Fails if the covariance is not positive definite.
    pub fn gaussian(mean: Vector6, covariance: &Matrix6) -> Result<Self, PsrCoreError> {
        let scale_tril = cholesky(covariance)?;
        Ok(Self { mean, scale_tril })
    }

    /// Build from flat row-major data, as stored in configuration files.
    pub fn from_flat(mean: &[f64], covariance: &[f64]) -> Result<Self, PsrCoreError> {
        if mean.len() != PHASE_SPACE_DIM {
            return Err(PsrCoreError::InvalidShape {
                expected: PHASE_SPACE_DIM,
                got: mean.len(),
            });
        }
        if covariance.len() != PHASE_SPACE_DIM * PHASE_SPACE_DIM {
            return Err(PsrCoreError::InvalidShape {
                expected: PHASE_SPACE_DIM * PHASE_SPACE_DIM,
                got: covariance.len(),
            });
        }
        let mut m = [0.0; PHASE_SPACE_DIM];
        m.copy_from_slice(mean);
        let mut cov = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];
        for (i, row) in cov.iter_mut().enumerate() {
            row.copy_from_slice(&covariance[i * PHASE_SPACE_DIM..(i + 1) * PHASE_SPACE_DIM]);
        }
        Self::gaussian(m, &cov)
    }

    /// Mean vector.
    pub fn mean(&self) -> &Vector6 {
        &self.mean
    }

    /// Lower Cholesky factor of the covariance.
    pub fn scale_tril(&self) -> &Matrix6 {
        &self.scale_tril
    }

    /// Covariance matrix `L Lᵀ`.
    pub fn covariance(&self) -> Matrix6 {
        let l = &self.scale_tril;
        let mut cov = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];
        for i in 0..PHASE_SPACE_DIM {
            for j in 0..PHASE_SPACE_DIM {
                cov[i][j] = (0..PHASE_SPACE_DIM).map(|k| l[i][k] * l[j][k]).sum();
            }
        }
        cov
    }

    /// Differential entropy in nats: `½ ln det Σ + 3 ln(2πe)`.
    pub fn entropy(&self) -> f64 {
        let half_log_det: f64 = (0..PHASE_SPACE_DIM).map(|i| self.scale_tril[i][i].ln()).sum();
        half_log_det + 0.5 * PHASE_SPACE_DIM as f64 * (2.0 * std::f64::consts::PI * std::f64::consts::E).ln()
    }

    /// Draw `n` samples, returned row-major as `n × 6` values.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(n * PHASE_SPACE_DIM);
        for _ in 0..n {
            let mut xi = [0.0; PHASE_SPACE_DIM];
            for v in xi.iter_mut() {
                *v = rng.sample(StandardNormal);
            }
            let p = lower_mul(&self.scale_tril, &xi);
            out.extend(p.iter().zip(self.mean.iter()).map(|(d, m)| (m + d) as f32));
        }
        out
    }
}
