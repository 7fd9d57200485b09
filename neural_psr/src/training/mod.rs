//! Training infrastructure for phase-space reconstruction.
//!
//! This module provides:
//! - `ReconstructionTrainer`: the mini-batch MENT training loop
//! - `ScanBatcher`: seeded mini-batch sampling
//! - Training metrics, observers and the loss recorder
//! - Checkpoint save/load for generator weights
//! - Drivers for 1D, sextupole, multi-device, 3D and dual-screen scans

mod batch;
mod checkpoint;
mod drivers;
mod finite;
mod metrics;
mod observer;
mod parallel;
mod trainer;

pub use batch::ScanBatcher;
pub use checkpoint::{
    checkpoint_dir, checkpoint_exists, find_latest_checkpoint, load_checkpoint, save_checkpoint,
    CheckpointMetadata,
};
pub use drivers::{
    train_1d_scan, train_1d_scan_multi_device, train_1d_sextupole_scan, train_3d_scan,
    train_3d_scan_dual_screen, SCAN_3D_RESULT_FILE,
};
pub use metrics::{EpochMetrics, TrainOutput};
pub use observer::{LossRecorder, TrainingObserver};
pub use trainer::ReconstructionTrainer;
