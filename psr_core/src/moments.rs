//! First and second moments of particle ensembles.

use crate::error::PsrCoreError;
use crate::linalg::log_det_spd;
use crate::types::{Matrix6, PhaseCoord, Vector6, PHASE_SPACE_DIM};

/// Mean vector and covariance matrix of an ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamMoments {
    /// Number of particles the moments were computed from.
    pub n_particles: usize,
    /// Centroid.
    pub mean: Vector6,
    /// Unbiased sample covariance.
    pub covariance: Matrix6,
}

impl BeamMoments {
    /// Compute moments from row-major `n × 6` particle data.
    ///
    /// Accumulates in f64 regardless of the storage precision.
    pub fn from_rows(rows: &[f32]) -> Result<Self, PsrCoreError> {
        if rows.len() % PHASE_SPACE_DIM != 0 {
            return Err(PsrCoreError::InvalidShape {
                expected: PHASE_SPACE_DIM,
                got: rows.len() % PHASE_SPACE_DIM,
            });
        }
        let n = rows.len() / PHASE_SPACE_DIM;
        if n < 2 {
            return Err(PsrCoreError::EmptyAxis { axis: "particles" });
        }

        let mut mean = [0.0; PHASE_SPACE_DIM];
        for row in rows.chunks_exact(PHASE_SPACE_DIM) {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += *v as f64;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        let mut covariance = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];
        for row in rows.chunks_exact(PHASE_SPACE_DIM) {
            let mut d = [0.0; PHASE_SPACE_DIM];
            for i in 0..PHASE_SPACE_DIM {
                d[i] = row[i] as f64 - mean[i];
            }
            for i in 0..PHASE_SPACE_DIM {
                for j in 0..=i {
                    covariance[i][j] += d[i] * d[j];
                }
            }
        }
        let norm = 1.0 / (n - 1) as f64;
        for i in 0..PHASE_SPACE_DIM {
            for j in 0..=i {
                covariance[i][j] *= norm;
                covariance[j][i] = covariance[i][j];
            }
        }

        Ok(Self {
            n_particles: n,
            mean,
            covariance,
        })
    }

    /// RMS size along one coordinate.
    pub fn rms(&self, coord: PhaseCoord) -> f64 {
        let i = coord.index();
        self.covariance[i][i].sqrt()
    }

    /// Geometric RMS emittance of a 2-D sub-plane, e.g. `(X, Px)`.
    pub fn emittance_2d(&self, a: PhaseCoord, b: PhaseCoord) -> f64 {
        let (i, j) = (a.index(), b.index());
        let det = self.covariance[i][i] * self.covariance[j][j]
            - self.covariance[i][j] * self.covariance[j][i];
        det.max(0.0).sqrt()
    }

    /// 6-D emittance `sqrt(det Σ)`.
    pub fn emittance_6d(&self) -> Result<f64, PsrCoreError> {
        Ok((0.5 * log_det_spd(&self.covariance)?).exp())
    }
}
