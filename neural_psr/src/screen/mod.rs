//! Image formation on virtual screens.

mod kde;

use std::fmt::Debug;

use burn::prelude::*;

use crate::lattice::PhaseSpace;

pub use kde::KdeScreen;

/// Differentiable projection of a batch of ensembles onto a screen.
pub trait Screen<B: Backend>: Clone + Debug {
    /// Image size `[ny, nx]`.
    fn resolution(&self) -> [usize; 2];

    /// One image per configuration: `[configs, ny, nx]`.
    fn image(&self, state: &PhaseSpace<B>) -> Tensor<B, 3>;
}
