//! Loss logs.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::beam::create_parent;
use crate::error::Result;

/// Detached loss components of one loss evaluation.
///
/// JSON has no NaN or infinity; non-finite values are written as `null`
/// and read back as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    /// Epoch index.
    pub epoch: usize,
    /// Global step index.
    pub step: usize,
    /// Total loss `-entropy + λ · image_loss`.
    #[serde(deserialize_with = "nan_from_null")]
    pub loss: f64,
    /// Image divergence summed over the batch.
    #[serde(deserialize_with = "nan_from_null")]
    pub image_loss: f64,
    /// Entropy term as it enters the loss (`-entropy`).
    #[serde(deserialize_with = "nan_from_null")]
    pub entropy_loss: f64,
    /// 6-D emittance of the generated sample.
    #[serde(deserialize_with = "nan_from_null")]
    pub emittance: f64,
    /// Lagrange multiplier λ used for this step.
    pub lambda: f64,
    /// Whether the optimizer step was skipped because the evaluation was
    /// not finite.
    #[serde(default)]
    pub skipped: bool,
}

fn nan_from_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Write records as a JSON array.
pub fn write_loss_log(path: &Path, records: &[LossRecord]) -> Result<()> {
    create_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// Read records written by [`write_loss_log`].
pub fn read_loss_log(path: &Path) -> Result<Vec<LossRecord>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
