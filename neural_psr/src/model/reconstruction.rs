//! The differentiable forward model of a scan.

use burn::prelude::*;

use crate::beam::{BaseSampler, BeamGenerator, ParticleEnsemble};
use crate::config::GeneratorConfig;
use crate::error::{NeuralPsrError, Result};
use crate::lattice::{ElementOverrides, Lattice, ScanKnob, Transport};
use crate::screen::{KdeScreen, Screen};

use super::ExecutionContext;

/// Output of one forward evaluation.
#[derive(Debug, Clone)]
pub struct ModelOutput<B: Backend> {
    /// Predicted images `[C, S, ny, nx]`.
    pub images: Tensor<B, 4>,
    /// Ensemble the images were formed from.
    pub beam: ParticleEnsemble<B>,
}

/// Generator, transport and screens of a reconstruction.
///
/// Screen `s` observes the beam through `lattices[s]`. A settings batch
/// `[C, S, K]` holds, for configuration `c` and screen `s`, the values of
/// the `K` scan knobs. The lattices are templates and are never modified.
#[derive(Debug, Clone)]
pub struct ReconstructionModel<B: Backend, T = Lattice, S = KdeScreen> {
    generator: BeamGenerator<B>,
    sampler: BaseSampler,
    lattices: Vec<T>,
    screens: Vec<S>,
    knobs: Vec<ScanKnob>,
    context: ExecutionContext<B>,
    n_particles: usize,
    p0c: f64,
    sample_seed: u64,
}

impl<B: Backend, T: Transport<B>, S: Screen<B>> ReconstructionModel<B, T, S> {
    /// Build a model with one lattice per screen.
    ///
    /// Every knob is checked against every lattice up front.
    pub fn new(
        generator: &GeneratorConfig,
        lattices: Vec<T>,
        screens: Vec<S>,
        knobs: Vec<ScanKnob>,
        context: ExecutionContext<B>,
    ) -> Result<Self> {
        if lattices.is_empty() || lattices.len() != screens.len() {
            return Err(NeuralPsrError::config(format!(
                "need one lattice per screen, got {} lattices and {} screens",
                lattices.len(),
                screens.len()
            )));
        }
        if knobs.is_empty() {
            return Err(NeuralPsrError::config("at least one scan knob is required"));
        }
        let resolution = screens[0].resolution();
        if screens.iter().any(|s| s.resolution() != resolution) {
            return Err(NeuralPsrError::config("all screens must share one resolution"));
        }
        for lattice in &lattices {
            for knob in &knobs {
                lattice.check_knob(knob)?;
            }
        }

        let (model, sampler) = generator.init::<B>(context.device())?;
        Ok(Self {
            generator: model,
            sampler,
            lattices,
            screens,
            knobs,
            context,
            n_particles: generator.n_particles,
            p0c: generator.p0c,
            sample_seed: generator.seed.wrapping_add(2),
        })
    }

    /// 1D quadrupole scan: K1 of element `quad` is swept.
    pub fn quad_scan(
        generator: &GeneratorConfig,
        lattice: T,
        screen: S,
        quad: usize,
        context: ExecutionContext<B>,
    ) -> Result<Self> {
        Self::new(
            generator,
            vec![lattice],
            vec![screen],
            vec![ScanKnob::quadrupole(quad)],
            context,
        )
    }

    /// 1D sextupole scan: K2 of element `sextupole` is swept.
    pub fn sextupole_scan(
        generator: &GeneratorConfig,
        lattice: T,
        screen: S,
        sextupole: usize,
        context: ExecutionContext<B>,
    ) -> Result<Self> {
        Self::new(
            generator,
            vec![lattice],
            vec![screen],
            vec![ScanKnob::sextupole(sextupole)],
            context,
        )
    }

    /// 3D scan over `[quad K1, deflector voltage, bend G]`.
    pub fn scan_3d(
        generator: &GeneratorConfig,
        lattice: T,
        screen: S,
        [quad, deflector, bend]: [usize; 3],
        context: ExecutionContext<B>,
    ) -> Result<Self> {
        Self::new(
            generator,
            vec![lattice],
            vec![screen],
            vec![
                ScanKnob::quadrupole(quad),
                ScanKnob::deflector(deflector),
                ScanKnob::bend(bend),
            ],
            context,
        )
    }

    /// 3D scan imaged on two screens: screen 0 with the bend off, screen 1
    /// with the bend on. Knob order is `[quad K1, deflector voltage, bend G]`.
    pub fn dual_screen(
        generator: &GeneratorConfig,
        lattices: [T; 2],
        screens: [S; 2],
        [quad, deflector, bend]: [usize; 3],
        context: ExecutionContext<B>,
    ) -> Result<Self> {
        Self::new(
            generator,
            lattices.into(),
            screens.into(),
            vec![
                ScanKnob::quadrupole(quad),
                ScanKnob::deflector(deflector),
                ScanKnob::bend(bend),
            ],
            context,
        )
    }

    /// Replace the generator, e.g. after an optimizer step or when resuming.
    pub fn with_generator(mut self, generator: BeamGenerator<B>) -> Self {
        self.generator = generator;
        self
    }

    pub(crate) fn set_generator(&mut self, generator: BeamGenerator<B>) {
        self.generator = generator;
    }

    /// The learnable generator.
    pub fn generator(&self) -> &BeamGenerator<B> {
        &self.generator
    }

    /// Scan knobs, in settings column order.
    pub fn knobs(&self) -> &[ScanKnob] {
        &self.knobs
    }

    /// Number of screens.
    pub fn n_screens(&self) -> usize {
        self.screens.len()
    }

    /// Image size `[ny, nx]`.
    pub fn resolution(&self) -> [usize; 2] {
        self.screens[0].resolution()
    }

    /// Device placement.
    pub fn context(&self) -> &ExecutionContext<B> {
        &self.context
    }

    /// Particles per forward pass.
    pub fn n_particles(&self) -> usize {
        self.n_particles
    }

    /// Reference momentum [eV/c].
    pub fn p0c(&self) -> f64 {
        self.p0c
    }

    /// Draw the base sample of the next forward pass on the primary device.
    pub fn draw_base(&mut self) -> Tensor<B, 2> {
        self.sampler.draw::<B>(self.n_particles, self.context.device())
    }

    /// Forward pass with the model's own generator and a fresh base sample.
    ///
    /// settings: [C, S, K]
    pub fn forward(&mut self, settings: Tensor<B, 3>) -> Result<ModelOutput<B>> {
        let base = self.draw_base();
        self.predict(&self.generator, base, settings)
    }

    /// Forward pass through an explicit generator, which may live on a
    /// replica device together with `base` and `settings`.
    ///
    /// base: [N, 6]
    /// settings: [C, S, K]
    pub fn predict(
        &self,
        generator: &BeamGenerator<B>,
        base: Tensor<B, 2>,
        settings: Tensor<B, 3>,
    ) -> Result<ModelOutput<B>> {
        let [c, s, k] = settings.dims();
        if s != self.screens.len() || k != self.knobs.len() {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![c, self.screens.len(), self.knobs.len()],
                got: vec![c, s, k],
            });
        }

        let beam = ParticleEnsemble::new(generator.forward(base), self.p0c)?;
        let mut images = Vec::with_capacity(s);
        for (i, (lattice, screen)) in self.lattices.iter().zip(&self.screens).enumerate() {
            let rows = settings.clone().slice([0..c, i..i + 1, 0..k]).reshape([c, k]);
            let overrides = ElementOverrides::from_settings(&self.knobs, rows)?;
            let state = lattice.track(&beam, &overrides)?;
            images.push(screen.image(&state));
        }

        Ok(ModelOutput {
            images: Tensor::stack(images, 1),
            beam,
        })
    }

    /// Independent copy of the model.
    ///
    /// Later optimizer steps on `self` do not affect the snapshot, and
    /// sampling from the snapshot does not advance the training stream.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Draw `n` detached particles from the current generator.
    ///
    /// Uses a dedicated sampler, so repeated calls on an unchanged model
    /// return the same ensemble.
    pub fn sample_beam(&self, n: usize) -> Result<ParticleEnsemble<B>> {
        let mut sampler = self.sampler.fork(self.sample_seed);
        let base = sampler.draw::<B>(n, self.context.device());
        ParticleEnsemble::new(self.generator.forward(base).detach(), self.p0c)
    }
}
