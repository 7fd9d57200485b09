//! Beam representation and the learnable beam generator.

mod ensemble;
mod generator;

pub use ensemble::ParticleEnsemble;
pub use generator::{BaseSampler, BeamGenerator};
