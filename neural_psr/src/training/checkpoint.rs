//! Checkpoint save/load for trained generators.
//!
//! A checkpoint directory holds:
//! - `metadata.json`: training progress
//! - `config.json`: the full training configuration
//! - `generator.mpk`: generator weights (Burn named MessagePack record)

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use crate::beam::{BaseSampler, BeamGenerator};
use crate::config::TrainingConfig;
use crate::error::{NeuralPsrError, Result};

const METADATA_FILE: &str = "metadata.json";
const CONFIG_FILE: &str = "config.json";
const GENERATOR_FILE: &str = "generator";

/// Checkpoint metadata stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Epoch the checkpoint was taken after.
    pub epoch: usize,
    /// Optimizer steps taken so far.
    pub total_steps: usize,
    /// Mean loss of the last epoch.
    pub loss: f64,
    /// Current λ.
    pub lambda: f64,
    /// Checkpoint format version.
    pub version: u32,
}

impl Default for CheckpointMetadata {
    fn default() -> Self {
        Self {
            epoch: 0,
            total_steps: 0,
            loss: f64::INFINITY,
            lambda: 0.0,
            version: 1,
        }
    }
}

impl CheckpointMetadata {
    /// Create metadata from training progress.
    pub fn new(epoch: usize, total_steps: usize, loss: f64, lambda: f64) -> Self {
        Self {
            epoch,
            total_steps,
            loss,
            lambda,
            ..Default::default()
        }
    }
}

fn io_error(e: std::io::Error) -> NeuralPsrError {
    NeuralPsrError::Io(e.into())
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Save a generator checkpoint to `dir`.
pub fn save_checkpoint<B: Backend>(
    dir: &Path,
    generator: &BeamGenerator<B>,
    config: &TrainingConfig,
    metadata: &CheckpointMetadata,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(io_error)?;

    let mut writer = BufWriter::new(File::create(dir.join(METADATA_FILE)).map_err(io_error)?);
    serde_json::to_writer_pretty(&mut writer, metadata)
        .map_err(|e| NeuralPsrError::Io(e.into()))?;
    writer.flush().map_err(io_error)?;

    config.save(dir.join(CONFIG_FILE)).map_err(io_error)?;

    generator
        .clone()
        .save_file(dir.join(GENERATOR_FILE), &recorder())
        .map_err(|e| NeuralPsrError::Record(e.to_string()))?;

    log::info!("Saved checkpoint to {:?} (epoch {})", dir, metadata.epoch);
    Ok(())
}

/// Load a checkpoint written by [`save_checkpoint`].
///
/// Returns the generator with its weights restored, a fresh base sampler
/// built from the stored configuration, the configuration and the metadata.
pub fn load_checkpoint<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> Result<(BeamGenerator<B>, BaseSampler, TrainingConfig, CheckpointMetadata)> {
    let reader = BufReader::new(File::open(dir.join(METADATA_FILE)).map_err(io_error)?);
    let metadata: CheckpointMetadata =
        serde_json::from_reader(reader).map_err(|e| NeuralPsrError::Io(e.into()))?;

    let config = TrainingConfig::load(dir.join(CONFIG_FILE))
        .map_err(|e| NeuralPsrError::config(e.to_string()))?;

    let (generator, sampler) = config.generator.init::<B>(device)?;
    let generator = generator
        .load_file(dir.join(GENERATOR_FILE), &recorder(), device)
        .map_err(|e| NeuralPsrError::Record(e.to_string()))?;

    log::info!("Loaded checkpoint from {:?} (epoch {})", dir, metadata.epoch);
    Ok((generator, sampler, config, metadata))
}

/// Directory name of the checkpoint taken after `epoch`.
pub fn checkpoint_dir(base_dir: &Path, epoch: usize) -> PathBuf {
    base_dir.join(format!("checkpoint_{}", epoch))
}

/// Check if a complete checkpoint exists at the given path.
pub fn checkpoint_exists(dir: &Path) -> bool {
    dir.join(METADATA_FILE).exists()
        && dir.join(CONFIG_FILE).exists()
        && dir.join(format!("{}.mpk", GENERATOR_FILE)).exists()
}

/// Get the latest checkpoint from a series of numbered checkpoints.
///
/// Looks for directories named `checkpoint_N` where N is an epoch number.
pub fn find_latest_checkpoint(base_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(base_dir).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && checkpoint_exists(path))
        .filter_map(|path| {
            let epoch = path
                .file_name()?
                .to_str()?
                .strip_prefix("checkpoint_")?
                .parse::<usize>()
                .ok()?;
            Some((epoch, path))
        })
        .max_by_key(|(epoch, _)| *epoch)
        .map(|(_, path)| path)
}
