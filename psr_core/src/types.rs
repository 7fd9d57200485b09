//! Phase-space layout and physical constants.

use std::fmt;

/// Number of phase-space coordinates per particle.
pub const PHASE_SPACE_DIM: usize = 6;

/// Speed of light in vacuum [m/s].
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Electron rest energy [eV].
pub const ELECTRON_MASS_EV: f64 = 0.510_998_950e6;

/// A 6-vector in phase space.
pub type Vector6 = [f64; PHASE_SPACE_DIM];

/// A dense 6×6 matrix (row-major).
pub type Matrix6 = [[f64; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];

/// Phase-space coordinate, in storage order `(x, px, y, py, z, pz)`.
///
/// Transverse momenta are normalized to the reference momentum, `pz` is the
/// relative momentum deviation and `z` the longitudinal offset from the
/// reference particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseCoord {
    /// Horizontal position [m].
    X,
    /// Horizontal momentum, px / p0.
    Px,
    /// Vertical position [m].
    Y,
    /// Vertical momentum, py / p0.
    Py,
    /// Longitudinal position [m].
    Z,
    /// Relative momentum deviation.
    Pz,
}

impl PhaseCoord {
    /// All coordinates in storage order.
    pub const ALL: [PhaseCoord; PHASE_SPACE_DIM] = [
        PhaseCoord::X,
        PhaseCoord::Px,
        PhaseCoord::Y,
        PhaseCoord::Py,
        PhaseCoord::Z,
        PhaseCoord::Pz,
    ];

    /// Column index of this coordinate.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            PhaseCoord::X => 0,
            PhaseCoord::Px => 1,
            PhaseCoord::Y => 2,
            PhaseCoord::Py => 3,
            PhaseCoord::Z => 4,
            PhaseCoord::Pz => 5,
        }
    }

    /// Short name as used in dumps and logs.
    pub const fn name(self) -> &'static str {
        match self {
            PhaseCoord::X => "x",
            PhaseCoord::Px => "px",
            PhaseCoord::Y => "y",
            PhaseCoord::Py => "py",
            PhaseCoord::Z => "z",
            PhaseCoord::Pz => "pz",
        }
    }
}

impl fmt::Display for PhaseCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity matrix.
pub fn identity6() -> Matrix6 {
    let mut m = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

/// Diagonal matrix from a vector.
pub fn diagonal6(diag: Vector6) -> Matrix6 {
    let mut m = [[0.0; PHASE_SPACE_DIM]; PHASE_SPACE_DIM];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = diag[i];
    }
    m
}
