//! End-to-end reconstruction drivers for the supported scan types.
//!
//! Each driver builds the model for its scan geometry, trains it on the
//! dataset and returns the reconstructed beam.

use burn::tensor::backend::AutodiffBackend;

use crate::config::TrainingConfig;
use crate::data::ScanDataset;
use crate::error::Result;
use crate::lattice::Transport;
use crate::model::{ExecutionContext, ReconstructionModel};
use crate::screen::Screen;

use super::{ReconstructionTrainer, TrainOutput};

/// Default file name of the final beam of a 3D scan.
pub const SCAN_3D_RESULT_FILE: &str = "3d_scan_result.npz";

fn fit<B, T, S>(
    model: ReconstructionModel<B, T, S>,
    dataset: &ScanDataset<B>,
    config: TrainingConfig,
) -> Result<(TrainOutput<B>, ReconstructionModel<B, T, S>)>
where
    B: AutodiffBackend,
    T: Transport<B>,
    S: Screen<B>,
{
    log::info!("Using device: {:?}", model.context().device());
    let mut trainer = ReconstructionTrainer::new(model, config)?;
    let output = trainer.fit(dataset, &mut ())?;
    Ok((output, trainer.into_model()))
}

/// Reconstruct a beam from a 1D quadrupole scan of element `quad`.
pub fn train_1d_scan<B, T, S>(
    dataset: &ScanDataset<B>,
    lattice: T,
    screen: S,
    quad: usize,
    config: TrainingConfig,
    context: ExecutionContext<B>,
) -> Result<TrainOutput<B>>
where
    B: AutodiffBackend,
    T: Transport<B>,
    S: Screen<B>,
{
    let model = ReconstructionModel::quad_scan(&config.generator, lattice, screen, quad, context)?;
    Ok(fit(model, dataset, config)?.0)
}

/// Reconstruct a beam from a 1D sextupole scan of element `sextupole`.
pub fn train_1d_sextupole_scan<B, T, S>(
    dataset: &ScanDataset<B>,
    lattice: T,
    screen: S,
    sextupole: usize,
    config: TrainingConfig,
    context: ExecutionContext<B>,
) -> Result<TrainOutput<B>>
where
    B: AutodiffBackend,
    T: Transport<B>,
    S: Screen<B>,
{
    let model =
        ReconstructionModel::sextupole_scan(&config.generator, lattice, screen, sextupole, context)?;
    Ok(fit(model, dataset, config)?.0)
}

/// 1D quadrupole scan with every mini-batch sharded over `replicas`.
///
/// Parameters and optimizer state stay on `device`.
pub fn train_1d_scan_multi_device<B, T, S>(
    dataset: &ScanDataset<B>,
    lattice: T,
    screen: S,
    quad: usize,
    config: TrainingConfig,
    device: B::Device,
    replicas: Vec<B::Device>,
) -> Result<TrainOutput<B>>
where
    B: AutodiffBackend,
    T: Transport<B>,
    S: Screen<B>,
{
    log::info!("Sharding mini-batches over {} replicas", replicas.len());
    let context = ExecutionContext::new(device).with_replicas(replicas);
    train_1d_scan(dataset, lattice, screen, quad, config, context)
}

/// Reconstruct a 6-D beam from a 3D scan over `[quad, deflector, bend]`.
///
/// When an output directory is configured and no final beam file is named,
/// the result is written to [`SCAN_3D_RESULT_FILE`]. Returns the trained
/// model alongside the output.
pub fn train_3d_scan<B, T, S>(
    dataset: &ScanDataset<B>,
    lattice: T,
    screen: S,
    ids: [usize; 3],
    mut config: TrainingConfig,
    context: ExecutionContext<B>,
) -> Result<(TrainOutput<B>, ReconstructionModel<B, T, S>)>
where
    B: AutodiffBackend,
    T: Transport<B>,
    S: Screen<B>,
{
    if config.checkpoint.output_dir.is_some() && config.checkpoint.final_beam_file.is_none() {
        config.checkpoint.final_beam_file = Some(SCAN_3D_RESULT_FILE.to_string());
    }
    let model = ReconstructionModel::scan_3d(&config.generator, lattice, screen, ids, context)?;
    fit(model, dataset, config)
}

/// Reconstruct a 6-D beam from a 3D scan imaged on two screens.
///
/// `lattices[0]`/`screens[0]` observe the bend-off configurations,
/// `lattices[1]`/`screens[1]` the bend-on ones.
pub fn train_3d_scan_dual_screen<B, T, S>(
    dataset: &ScanDataset<B>,
    lattices: [T; 2],
    screens: [S; 2],
    ids: [usize; 3],
    config: TrainingConfig,
    context: ExecutionContext<B>,
) -> Result<TrainOutput<B>>
where
    B: AutodiffBackend,
    T: Transport<B>,
    S: Screen<B>,
{
    let model =
        ReconstructionModel::dual_screen(&config.generator, lattices, screens, ids, context)?;
    Ok(fit(model, dataset, config)?.0)
}
