//! Small dense linear algebra on 6×6 matrices.
//!
//! The reconstruction only ever needs factorizations of phase-space
//! covariance matrices, so everything here is fixed-size and allocation-free.

use crate::error::PsrCoreError;
use crate::types::{Matrix6, Vector6, PHASE_SPACE_DIM};

/// Cholesky factorization `m = L Lᵀ` of a symmetric positive-definite matrix.
///
/// Returns the lower-triangular factor `L`. Only the lower triangle of `m`
/// is read.
///
/// # Errors
/// [`PsrCoreError::NotPositiveDefinite`] if a pivot is not strictly positive.
pub fn cholesky(m: &Matrix6) -> Result<Matrix6, PsrCoreError> {
    let mut l = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];

    for j in 0..PHASE_SPACE_DIM {
        let mut diag = m[j][j];
        for k in 0..j {
            diag -= l[j][k] * l[j][k];
        }
        if !diag.is_finite() || diag <= 0.0 {
            return Err(PsrCoreError::NotPositiveDefinite { pivot: j, value: diag });
        }
        let ljj = diag.sqrt();
        l[j][j] = ljj;

        for i in (j + 1)..PHASE_SPACE_DIM {
            let mut s = m[i][j];
            for k in 0..j {
                s -= l[i][k] * l[j][k];
            }
            l[i][j] = s / ljj;
        }
    }

    Ok(l)
}

/// Natural log of the determinant of a symmetric positive-definite matrix.
pub fn log_det_spd(m: &Matrix6) -> Result<f64, PsrCoreError> {
    let l = cholesky(m)?;
    Ok(2.0 * (0..PHASE_SPACE_DIM).map(|i| l[i][i].ln()).sum::<f64>())
}

/// Lower-triangular matrix-vector product `L v`.
#[inline]
pub fn lower_mul(l: &Matrix6, v: &Vector6) -> Vector6 {
    let mut out = [0.0; PHASE_SPACE_DIM];
    for i in 0..PHASE_SPACE_DIM {
        let mut s = 0.0;
        for k in 0..=i {
            s += l[i][k] * v[k];
        }
        out[i] = s;
    }
    out
}

/// Dense matrix product `a b`.
pub fn matmul(a: &Matrix6, b: &Matrix6) -> Matrix6 {
    let mut out = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];
    for i in 0..PHASE_SPACE_DIM {
        for j in 0..PHASE_SPACE_DIM {
            out[i][j] = (0..PHASE_SPACE_DIM).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Matrix transpose.
pub fn transpose(a: &Matrix6) -> Matrix6 {
    let mut out = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];
    for i in 0..PHASE_SPACE_DIM {
        for j in 0..PHASE_SPACE_DIM {
            out[j][i] = a[i][j];
        }
    }
    out
}
