//! Beam generator: a fixed base distribution pushed through a learnable
//! transform.

use burn::module::Module;
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use psr_core::{BaseDistribution, PHASE_SPACE_DIM};

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::nn::NnTransform;

use super::ParticleEnsemble;

/// Source of base samples for the generator.
///
/// Owns a seeded RNG so that a run is reproducible end to end. With
/// `resample` disabled the first draw is cached and returned on every call
/// with the same particle count.
#[derive(Debug, Clone)]
pub struct BaseSampler {
    base: BaseDistribution,
    rng: StdRng,
    resample: bool,
    cached: Option<Vec<f32>>,
}

impl BaseSampler {
    /// Create a sampler.
    pub fn new(base: BaseDistribution, seed: u64, resample: bool) -> Self {
        Self {
            base,
            rng: StdRng::seed_from_u64(seed),
            resample,
            cached: None,
        }
    }

    /// The base distribution.
    pub fn base(&self) -> &BaseDistribution {
        &self.base
    }

    /// Whether every draw is fresh.
    pub fn resamples(&self) -> bool {
        self.resample
    }

    /// Independent resampling sampler over the same base distribution.
    pub fn fork(&self, seed: u64) -> Self {
        Self::new(self.base.clone(), seed, true)
    }

    /// Draw `n` base samples as a `[n, 6]` tensor.
    pub fn draw<B: Backend>(&mut self, n: usize, device: &B::Device) -> Tensor<B, 2> {
        let rows = match &self.cached {
            Some(rows) if !self.resample && rows.len() == n * PHASE_SPACE_DIM => rows.clone(),
            _ => {
                let rows = self.base.sample(&mut self.rng, n);
                if !self.resample {
                    self.cached = Some(rows.clone());
                }
                rows
            }
        };
        Tensor::from_data(TensorData::new(rows, [n, PHASE_SPACE_DIM]), device)
    }
}

impl GeneratorConfig {
    /// Initialize the generator module and its base sampler.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<(BeamGenerator<B>, BaseSampler)> {
        self.checked()?;
        let generator = BeamGenerator {
            transform: self.transform.init(self.seed, device),
        };
        // offset keeps the sampler stream independent of the weight stream
        let sampler = BaseSampler::new(
            self.base_distribution()?,
            self.seed.wrapping_add(1),
            self.resample_each_forward,
        );
        Ok((generator, sampler))
    }
}

/// Learnable beam generator.
///
/// The transform parameters are the only trainable state of a
/// reconstruction.
#[derive(Module, Debug)]
pub struct BeamGenerator<B: Backend> {
    transform: NnTransform<B>,
}

impl<B: Backend> BeamGenerator<B> {
    /// Wrap an existing transform.
    pub fn new(transform: NnTransform<B>) -> Self {
        Self { transform }
    }

    /// Map base samples `[n, 6]` to beam coordinates `[n, 6]`.
    pub fn forward(&self, base: Tensor<B, 2>) -> Tensor<B, 2> {
        self.transform.forward(base)
    }

    /// Draw `n` particles at reference momentum `p0c`.
    pub fn sample(
        &self,
        sampler: &mut BaseSampler,
        n: usize,
        p0c: f64,
        device: &B::Device,
    ) -> Result<ParticleEnsemble<B>> {
        let base = sampler.draw::<B>(n, device);
        ParticleEnsemble::new(self.forward(base), p0c)
    }
}
