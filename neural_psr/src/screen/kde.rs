//! Kernel-density-estimate screen.

use burn::prelude::*;

use crate::config::ScreenConfig;
use crate::error::{NeuralPsrError, Result};
use crate::lattice::PhaseSpace;

use super::Screen;

/// Screen forming images as Gaussian-kernel histograms on fixed pixel
/// centers.
///
/// Each particle contributes `exp(-((x - xᵢ)² / 2σ²)) · exp(-((y - yⱼ)² / 2σ²))`
/// to pixel `(j, i)`; every image is normalized to unit sum.
#[derive(Debug, Clone, PartialEq)]
pub struct KdeScreen {
    bins_x: Vec<f32>,
    bins_y: Vec<f32>,
    bandwidth_x: f64,
    bandwidth_y: f64,
}

impl KdeScreen {
    /// Build a screen from its configuration.
    pub fn new(config: &ScreenConfig) -> Result<Self> {
        config.validate().map_err(NeuralPsrError::config)?;
        Ok(Self {
            bins_x: config.bin_centers_x().into_iter().map(|v| v as f32).collect(),
            bins_y: config.bin_centers_y().into_iter().map(|v| v as f32).collect(),
            bandwidth_x: config.bandwidth_factor * config.pixel_size_x(),
            bandwidth_y: config.bandwidth_factor * config.pixel_size_y(),
        })
    }

    /// Pixel centers along x.
    pub fn bins_x(&self) -> &[f32] {
        &self.bins_x
    }

    /// Pixel centers along y.
    pub fn bins_y(&self) -> &[f32] {
        &self.bins_y
    }

    /// Kernel weights `[configs, particles, bins]`.
    fn weights<B: Backend>(coord: Tensor<B, 2>, bins: &[f32], bandwidth: f64) -> Tensor<B, 3> {
        let [c, n] = coord.dims();
        let nb = bins.len();
        let centers = Tensor::<B, 1>::from_data(TensorData::new(bins.to_vec(), [nb]), &coord.device())
            .reshape([1, 1, nb])
            .expand([c, n, nb]);
        let offset = coord.unsqueeze_dim::<3>(2).expand([c, n, nb]) - centers;
        offset
            .powf_scalar(2.0)
            .mul_scalar(-0.5 / (bandwidth * bandwidth))
            .exp()
    }
}

impl<B: Backend> Screen<B> for KdeScreen {
    fn resolution(&self) -> [usize; 2] {
        [self.bins_y.len(), self.bins_x.len()]
    }

    fn image(&self, state: &PhaseSpace<B>) -> Tensor<B, 3> {
        let c = state.n_configs();
        let (ny, nx) = (self.bins_y.len(), self.bins_x.len());

        let wx = Self::weights(state.x.clone(), &self.bins_x, self.bandwidth_x);
        let wy = Self::weights(state.y.clone(), &self.bins_y, self.bandwidth_y);

        // [c, ny, n] @ [c, n, nx]
        let hist = wy.swap_dims(1, 2).matmul(wx);
        let total = hist
            .clone()
            .sum_dim(2)
            .sum_dim(1)
            .add_scalar(1e-20)
            .expand([c, ny, nx]);
        hist / total
    }
}
