//! Settings ↔ images dataset.

use std::path::Path;

use burn::prelude::*;
use ndarray::{Array3, Array5};

use psr_io::{load_scan_data, save_scan_data, ScanData};

use crate::error::{NeuralPsrError, Result};

/// Scan settings and measured images on one device.
///
/// - `settings`: `[M, S, K]` knob values per configuration and screen
/// - `images`: `[M, S, R, ny, nx]` normalized images, R repeats each
///
/// Both share the leading configuration axis. A dataset is immutable once
/// built; batching selects rows into new datasets.
#[derive(Debug, Clone)]
pub struct ScanDataset<B: Backend> {
    settings: Tensor<B, 3>,
    images: Tensor<B, 5>,
}

impl<B: Backend> ScanDataset<B> {
    /// Create a dataset, checking that settings and images agree.
    pub fn new(settings: Tensor<B, 3>, images: Tensor<B, 5>) -> Result<Self> {
        let [m, s, _] = settings.dims();
        let [im, is, r, ny, nx] = images.dims();
        if m == 0 {
            return Err(NeuralPsrError::EmptyDataset);
        }
        if (m, s) != (im, is) {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![m, s, r, ny, nx],
                got: vec![im, is, r, ny, nx],
            });
        }
        Ok(Self { settings, images })
    }

    /// 1D scan: one knob, one screen.
    ///
    /// settings: [M]
    /// images: [M, R, ny, nx]
    pub fn from_1d(settings: Tensor<B, 1>, images: Tensor<B, 4>) -> Result<Self> {
        let [m] = settings.dims();
        Self::new(settings.reshape([m, 1, 1]), images.unsqueeze_dim(1))
    }

    /// 3D scan: `[K1, voltage, G]` rows, one screen.
    ///
    /// settings: [M, 3]
    /// images: [M, R, ny, nx]
    pub fn from_3d(settings: Tensor<B, 2>, images: Tensor<B, 4>) -> Result<Self> {
        let [m, k] = settings.dims();
        if k != 3 {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![m, 3],
                got: vec![m, k],
            });
        }
        Self::new(settings.reshape([m, 1, 3]), images.unsqueeze_dim(1))
    }

    /// Dual-screen scan: entry `[m, 0]` is imaged on screen 0 (bend off),
    /// entry `[m, 1]` on screen 1 (bend on).
    ///
    /// settings: [M, 2, 3]
    /// images: [M, 2, R, ny, nx]
    pub fn dual_screen(settings: Tensor<B, 3>, images: Tensor<B, 5>) -> Result<Self> {
        let [m, s, k] = settings.dims();
        if s != 2 || k != 3 {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![m, 2, 3],
                got: vec![m, s, k],
            });
        }
        Self::new(settings, images)
    }

    /// Settings `[M, S, K]`.
    pub fn settings(&self) -> &Tensor<B, 3> {
        &self.settings
    }

    /// Images `[M, S, R, ny, nx]`.
    pub fn images(&self) -> &Tensor<B, 5> {
        &self.images
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.settings.dims()[0]
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of screens.
    pub fn n_screens(&self) -> usize {
        self.settings.dims()[1]
    }

    /// Number of scan knobs.
    pub fn n_knobs(&self) -> usize {
        self.settings.dims()[2]
    }

    /// Repeated images per configuration.
    pub fn n_repeats(&self) -> usize {
        self.images.dims()[2]
    }

    /// Image size `[ny, nx]`.
    pub fn resolution(&self) -> [usize; 2] {
        let dims = self.images.dims();
        [dims[3], dims[4]]
    }

    /// Rows `indices` as a new dataset.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(NeuralPsrError::config(format!(
                "configuration {} out of range for dataset of {}",
                index,
                self.len()
            )));
        }
        let device = self.settings.device();
        let ids: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
        let ids = Tensor::<B, 1, Int>::from_data(TensorData::new(ids, [indices.len()]), &device);
        Self::new(
            self.settings.clone().select(0, ids.clone()),
            self.images.clone().select(0, ids),
        )
    }

    /// Move the dataset to another device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            settings: self.settings.to_device(device),
            images: self.images.to_device(device),
        }
    }

    /// Copy into host arrays.
    pub fn to_scan_data(&self) -> Result<ScanData> {
        let [m, s, k] = self.settings.dims();
        let [_, _, r, ny, nx] = self.images.dims();
        let settings = Array3::from_shape_vec((m, s, k), values(self.settings.clone())?)
            .map_err(|e| NeuralPsrError::TensorData(e.to_string()))?;
        let images = Array5::from_shape_vec((m, s, r, ny, nx), values(self.images.clone())?)
            .map_err(|e| NeuralPsrError::TensorData(e.to_string()))?;
        Ok(ScanData::new(settings, images)?)
    }

    /// Upload host arrays.
    pub fn from_scan_data(data: &ScanData, device: &B::Device) -> Result<Self> {
        let settings_shape: [usize; 3] = shape(data.settings.shape())?;
        let images_shape: [usize; 5] = shape(data.images.shape())?;
        let settings: Vec<f32> = data.settings.iter().copied().collect();
        let images: Vec<f32> = data.images.iter().copied().collect();
        Self::new(
            Tensor::from_data(TensorData::new(settings, settings_shape), device),
            Tensor::from_data(TensorData::new(images, images_shape), device),
        )
    }

    /// Save as `.npz`.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_scan_data(path, &self.to_scan_data()?)?;
        Ok(())
    }

    /// Load a dataset saved with [`ScanDataset::save`].
    pub fn load(path: &Path, device: &B::Device) -> Result<Self> {
        Self::from_scan_data(&load_scan_data(path)?, device)
    }
}

fn values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| NeuralPsrError::TensorData(format!("{:?}", e)))
}

fn shape<const D: usize>(dims: &[usize]) -> Result<[usize; D]> {
    dims.try_into().map_err(|_| NeuralPsrError::ShapeMismatch {
        expected: vec![0; D],
        got: dims.to_vec(),
    })
}
