//! Particle ensemble dumps.

use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::Path;

use ndarray::{arr1, Array1, Array2, ArrayBase, Dimension, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};

use psr_core::{BeamMoments, PsrCoreError, PHASE_SPACE_DIM};

use crate::error::{PsrIoError, Result};

/// A particle ensemble as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamDump {
    /// Particle coordinates `[N, 6]` in `(x, px, y, py, z, pz)` order.
    pub coords: Array2<f32>,
    /// Reference momentum [eV/c].
    pub p0c: f64,
}

impl BeamDump {
    /// Create a dump, checking the coordinate width.
    pub fn new(coords: Array2<f32>, p0c: f64) -> Result<Self> {
        check_width(&coords)?;
        Ok(Self { coords, p0c })
    }

    /// Create from row-major `N × 6` values.
    pub fn from_rows(rows: &[f32], p0c: f64) -> Result<Self> {
        let n = rows.len() / PHASE_SPACE_DIM;
        let coords = Array2::from_shape_vec((n, PHASE_SPACE_DIM), rows.to_vec()).map_err(|_| {
            PsrIoError::Shape {
                name: "coords".into(),
                expected: vec![n, PHASE_SPACE_DIM],
                got: vec![rows.len()],
            }
        })?;
        Ok(Self { coords, p0c })
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.coords.nrows()
    }

    /// Whether the dump holds no particles.
    pub fn is_empty(&self) -> bool {
        self.coords.nrows() == 0
    }

    /// Row-major copy of the coordinates.
    pub fn to_rows(&self) -> Vec<f32> {
        self.coords.iter().copied().collect()
    }

    /// Beam moments of the stored ensemble.
    pub fn moments(&self) -> std::result::Result<BeamMoments, PsrCoreError> {
        BeamMoments::from_rows(&self.to_rows())
    }
}

fn check_width(coords: &Array2<f32>) -> Result<()> {
    if coords.ncols() != PHASE_SPACE_DIM {
        return Err(PsrIoError::Shape {
            name: "coords".into(),
            expected: vec![0, PHASE_SPACE_DIM],
            got: coords.shape().to_vec(),
        });
    }
    Ok(())
}

pub(crate) fn read_array<R, D>(npz: &mut NpzReader<R>, key: &str) -> Result<ArrayBase<OwnedRepr<f32>, D>>
where
    R: Read + Seek,
    D: Dimension,
{
    npz.by_name::<OwnedRepr<f32>, D>(&format!("{key}.npy"))
        .or_else(|_| npz.by_name::<OwnedRepr<f32>, D>(key))
        .map_err(|e| {
            log::debug!("Failed to read '{}': {}", key, e);
            PsrIoError::MissingArray { name: key.into() }
        })
}

pub(crate) fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Save a beam dump as `.npz` with arrays `coords` and `p0c`.
pub fn save_beam(path: &Path, dump: &BeamDump) -> Result<()> {
    check_width(&dump.coords)?;
    create_parent(path)?;

    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("coords", &dump.coords)?;
    npz.add_array("p0c", &arr1(&[dump.p0c]))?;
    npz.finish()?;

    log::debug!("Saved {} particles to {:?}", dump.len(), path);
    Ok(())
}

/// Load a beam dump written by [`save_beam`].
pub fn load_beam(path: &Path) -> Result<BeamDump> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let coords: Array2<f32> = read_array(&mut npz, "coords")?;
    check_width(&coords)?;

    let p0c: Array1<f64> = npz
        .by_name("p0c.npy")
        .or_else(|_| npz.by_name("p0c"))
        .map_err(|_| PsrIoError::MissingArray { name: "p0c".into() })?;
    let p0c = *p0c.first().ok_or_else(|| PsrIoError::Shape {
        name: "p0c".into(),
        expected: vec![1],
        got: vec![0],
    })?;

    Ok(BeamDump { coords, p0c })
}
