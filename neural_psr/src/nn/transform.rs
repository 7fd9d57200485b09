//! Learnable phase-space transform.

use burn::module::{Module, Param};
use burn::nn::{Dropout, DropoutConfig, Linear, Tanh};
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use psr_core::PHASE_SPACE_DIM;

use crate::config::TransformConfig;

/// Linear layer with weights drawn from `U(-1/√fan_in, 1/√fan_in)`.
///
/// Initialization goes through a caller-owned RNG instead of the backend's
/// global one, so two generators built from the same seed are identical.
pub fn seeded_linear<B: Backend>(
    d_input: usize,
    d_output: usize,
    rng: &mut StdRng,
    zero: bool,
    device: &B::Device,
) -> Linear<B> {
    let bound = 1.0 / (d_input as f64).sqrt();
    let mut draw = |n: usize| -> Vec<f32> {
        (0..n)
            .map(|_| if zero { 0.0 } else { rng.gen_range(-bound..bound) as f32 })
            .collect()
    };

    let weight = Tensor::<B, 2>::from_data(
        TensorData::new(draw(d_input * d_output), [d_input, d_output]),
        device,
    );
    let bias = Tensor::<B, 1>::from_data(TensorData::new(draw(d_output), [d_output]), device);

    Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    }
}

impl TransformConfig {
    /// Initialize the transform with weights drawn from `seed`.
    pub fn init<B: Backend>(&self, seed: u64, device: &B::Device) -> NnTransform<B> {
        let mut rng = StdRng::seed_from_u64(seed);

        let input = seeded_linear(PHASE_SPACE_DIM, self.width, &mut rng, false, device);
        let hidden = (0..self.n_hidden)
            .map(|_| seeded_linear(self.width, self.width, &mut rng, false, device))
            .collect();
        let output = seeded_linear(
            self.width,
            PHASE_SPACE_DIM,
            &mut rng,
            self.zero_init_output,
            device,
        );

        let dropout = if self.dropout > 0.0 {
            Some(DropoutConfig::new(self.dropout).init())
        } else {
            None
        };

        NnTransform {
            input,
            hidden,
            output,
            activation: Tanh::new(),
            dropout,
            output_scale: self.output_scale,
            residual: self.residual,
        }
    }
}

/// Tanh MLP mapping base samples to beam coordinates.
///
/// `6 → width → (width → width)×n_hidden → 6`, output multiplied by
/// `output_scale`; with `residual` the input is added back.
#[derive(Module, Debug)]
pub struct NnTransform<B: Backend> {
    input: Linear<B>,
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Tanh,
    dropout: Option<Dropout>,
    #[module(skip)]
    output_scale: f64,
    #[module(skip)]
    residual: bool,
}

impl<B: Backend> NnTransform<B> {
    /// Forward pass.
    ///
    /// Input shape: [n_particles, 6]
    /// Output shape: [n_particles, 6]
    pub fn forward(&self, base: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = self.activation.forward(self.input.forward(base.clone()));

        for layer in &self.hidden {
            x = layer.forward(x);
            if let Some(ref dropout) = self.dropout {
                x = dropout.forward(x);
            }
            x = self.activation.forward(x);
        }

        let out = self.output.forward(x).mul_scalar(self.output_scale);

        if self.residual {
            base + out
        } else {
            out
        }
    }

    /// Number of hidden `width → width` layers.
    pub fn n_hidden(&self) -> usize {
        self.hidden.len()
    }
}
