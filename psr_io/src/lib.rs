//! # psr_io
//!
//! Persistence for beam phase-space reconstruction.
//!
//! Everything a reconstruction run writes to disk goes through this crate:
//! - **Beam dumps**: particle ensembles as `.npz` (`coords` `[N, 6]` + `p0c`)
//! - **Scan datasets**: settings `[M, S, K]` and images `[M, S, R, ny, nx]` as `.npz`
//! - **Loss logs**: per-step loss components as JSON
//! - **Snapshot naming**: `dist_{epoch}.npz` files inside an output directory
//!
//! Arrays are plain `ndarray` values so the files can be opened directly with
//! NumPy (`np.load`).
//!
//! ## Usage
//!
//! ```ignore
//! use psr_io::{BeamDump, save_beam, load_beam, snapshot_path};
//!
//! let dump = BeamDump::from_rows(&rows, 10.0e6)?;
//! save_beam(&snapshot_path(&out_dir, "dist", 1000), &dump)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod beam;
pub mod dataset;
pub mod error;
pub mod loss_log;
pub mod naming;

pub use beam::{load_beam, save_beam, BeamDump};
pub use dataset::{load_scan_data, save_scan_data, ScanData};
pub use error::{PsrIoError, Result};
pub use loss_log::{read_loss_log, write_loss_log, LossRecord};
pub use naming::{list_snapshots, snapshot_path};
