//! # psr_core
//!
//! Pure mathematical building blocks for beam phase-space reconstruction.
//!
//! This crate has no tensor dependency. It provides the pieces that both the
//! persistence layer (`psr_io`) and the differentiable training stack
//! (`neural_psr`) agree on: phase-space coordinate layout, the Gaussian base
//! distribution the generator draws from, beam moment statistics and the
//! scan grids used to build multi-dimensional measurement campaigns.
//!
//! ## Modules
//!
//! - [`types`]: Phase-space coordinate layout and physical constants
//! - [`linalg`]: Small dense 6×6 linear algebra (Cholesky, log-determinant)
//! - [`distribution`]: Base distribution sampling with a seeded RNG
//! - [`moments`]: First and second moments of a particle ensemble
//! - [`scan`]: Scan grids (1D sweeps, 3D meshgrids, dual-screen and t-scans)
//! - [`error`]: Error types
//!
//! ## Usage
//!
//! ```
//! use psr_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let base = BaseDistribution::standard();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let particles = base.sample(&mut rng, 1000);
//! let moments = BeamMoments::from_rows(&particles).unwrap();
//! assert_eq!(moments.n_particles, 1000);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distribution;
pub mod error;
pub mod linalg;
pub mod moments;
pub mod scan;
pub mod types;

pub use distribution::BaseDistribution;
pub use error::PsrCoreError;
pub use moments::BeamMoments;
pub use scan::{DualScreenGrid, ScanGrid};
pub use types::{Matrix6, PhaseCoord, Vector6, PHASE_SPACE_DIM};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::distribution::BaseDistribution;
    pub use crate::error::PsrCoreError;
    pub use crate::linalg::{cholesky, log_det_spd};
    pub use crate::moments::BeamMoments;
    pub use crate::scan::{linspace, meshgrid3, t_scan, DualScreenGrid, ScanGrid};
    pub use crate::types::{
        Matrix6, PhaseCoord, Vector6, ELECTRON_MASS_EV, PHASE_SPACE_DIM, SPEED_OF_LIGHT,
    };
}
