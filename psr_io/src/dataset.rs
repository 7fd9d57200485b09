//! Measured (or simulated) scan datasets.

use std::fs::File;
use std::path::Path;

use ndarray::{Array3, Array5};
use ndarray_npy::{NpzReader, NpzWriter};

use crate::beam::{create_parent, read_array};
use crate::error::{PsrIoError, Result};

/// Scan settings and the images recorded at each setting.
///
/// Layout:
/// - `settings`: `[M, S, K]`, M configurations, S screens, K scanned knobs
/// - `images`: `[M, S, R, ny, nx]`, R repeated images per configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScanData {
    /// Knob settings per configuration and screen.
    pub settings: Array3<f32>,
    /// Images per configuration, screen and repetition.
    pub images: Array5<f32>,
}

impl ScanData {
    /// Create a dataset, checking that settings and images agree.
    pub fn new(settings: Array3<f32>, images: Array5<f32>) -> Result<Self> {
        let s = settings.shape();
        let i = images.shape();
        if s[0] != i[0] || s[1] != i[1] {
            return Err(PsrIoError::Shape {
                name: "images".into(),
                expected: vec![s[0], s[1], 0, 0, 0],
                got: i.to_vec(),
            });
        }
        Ok(Self { settings, images })
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.settings.shape()[0]
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Save a dataset as `.npz` with arrays `settings` and `images`.
pub fn save_scan_data(path: &Path, data: &ScanData) -> Result<()> {
    create_parent(path)?;

    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("settings", &data.settings)?;
    npz.add_array("images", &data.images)?;
    npz.finish()?;

    log::info!("Saved scan dataset with {} configurations to {:?}", data.len(), path);
    Ok(())
}

/// Load a dataset written by [`save_scan_data`].
pub fn load_scan_data(path: &Path) -> Result<ScanData> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let settings: Array3<f32> = read_array(&mut npz, "settings")?;
    let images: Array5<f32> = read_array(&mut npz, "images")?;
    ScanData::new(settings, images)
}
