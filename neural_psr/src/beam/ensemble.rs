//! Particle ensembles.

use burn::prelude::*;
use ndarray::Array2;

use psr_core::{BeamMoments, PhaseCoord, PHASE_SPACE_DIM};
use psr_io::BeamDump;

use crate::error::{NeuralPsrError, Result};

/// N particles in 6-D phase space plus their reference momentum.
///
/// Coordinates are stored as a `[N, 6]` tensor in `(x, px, y, py, z, pz)`
/// order. An ensemble is a value: transport and sampling always produce new
/// ensembles.
#[derive(Debug, Clone)]
pub struct ParticleEnsemble<B: Backend> {
    coords: Tensor<B, 2>,
    p0c: f64,
}

impl<B: Backend> ParticleEnsemble<B> {
    /// Wrap a `[N, 6]` coordinate tensor.
    pub fn new(coords: Tensor<B, 2>, p0c: f64) -> Result<Self> {
        let dims = coords.dims();
        if dims[1] != PHASE_SPACE_DIM {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![dims[0], PHASE_SPACE_DIM],
                got: dims.to_vec(),
            });
        }
        Ok(Self { coords, p0c })
    }

    /// Build from row-major `N × 6` values.
    pub fn from_rows(rows: &[f32], p0c: f64, device: &B::Device) -> Result<Self> {
        if rows.len() % PHASE_SPACE_DIM != 0 {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![rows.len() / PHASE_SPACE_DIM, PHASE_SPACE_DIM],
                got: vec![rows.len()],
            });
        }
        let n = rows.len() / PHASE_SPACE_DIM;
        let coords = Tensor::from_data(TensorData::new(rows.to_vec(), [n, PHASE_SPACE_DIM]), device);
        Ok(Self { coords, p0c })
    }

    /// Build from an on-disk dump.
    pub fn from_dump(dump: &BeamDump, device: &B::Device) -> Result<Self> {
        Self::from_rows(&dump.to_rows(), dump.p0c, device)
    }

    /// Coordinate tensor `[N, 6]`.
    pub fn coords(&self) -> &Tensor<B, 2> {
        &self.coords
    }

    /// Consume the ensemble, returning the coordinate tensor.
    pub fn into_coords(self) -> Tensor<B, 2> {
        self.coords
    }

    /// Reference momentum [eV/c].
    pub fn p0c(&self) -> f64 {
        self.p0c
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.coords.dims()[0]
    }

    /// Whether the ensemble is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One coordinate as a `[N]` tensor.
    pub fn coord(&self, coord: PhaseCoord) -> Tensor<B, 1> {
        let n = self.len();
        let i = coord.index();
        self.coords.clone().slice([0..n, i..i + 1]).reshape([n])
    }

    /// Move the ensemble to another device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            coords: self.coords.to_device(device),
            p0c: self.p0c,
        }
    }

    /// Row-major copy of the coordinates.
    pub fn to_rows(&self) -> Result<Vec<f32>> {
        self.coords
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| NeuralPsrError::TensorData(format!("{:?}", e)))
    }

    /// First and second moments of the ensemble.
    pub fn moments(&self) -> Result<BeamMoments> {
        Ok(BeamMoments::from_rows(&self.to_rows()?)?)
    }

    /// Convert to an on-disk dump.
    pub fn to_dump(&self) -> Result<BeamDump> {
        let rows = self.to_rows()?;
        let coords = Array2::from_shape_vec((self.len(), PHASE_SPACE_DIM), rows)
            .map_err(|e| NeuralPsrError::TensorData(e.to_string()))?;
        Ok(BeamDump::new(coords, self.p0c)?)
    }
}
