//! # neural_psr
//!
//! Differentiable beam phase-space reconstruction with Burn.
//!
//! A learnable generator maps Gaussian base samples to a 6-D particle
//! ensemble. The ensemble is tracked through a differentiable beamline for
//! every configuration of a scan and projected onto screens; the generator
//! is trained by maximizing the entropy of the beam subject to matching the
//! measured images (MENT):
//!
//! ```text
//! loss = -entropy + λ · Σ t · |ln(t + ε) − ln(p + ε)|
//! ```
//!
//! ## Features
//!
//! - **Generator**: `BeamGenerator<B>` with a seeded base sampler
//! - **Transport**: immutable `Lattice` templates tracked with per-configuration `ElementOverrides`
//! - **Screens**: differentiable Gaussian-kernel histograms (`KdeScreen`)
//! - **Training**: mini-batch Adam, adaptive λ, non-finite step policy, snapshots, checkpoints
//! - **Virtual scans**: synthetic datasets from a known beam
//!
//! ## Quick Start
//!
//! ```ignore
//! use neural_psr::prelude::*;
//! use burn::backend::{Autodiff, NdArray};
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let lattice = Lattice::new(vec![Element::quadrupole(0.1, 0.0), Element::drift(1.0)]);
//! let screen = KdeScreen::new(&ScreenConfig::square(64, 4e-3))?;
//! let dataset = ScanDataset::<MyBackend>::load("quad_scan.npz".as_ref(), &device)?;
//!
//! let config = TrainingConfig::quad_scan(GeneratorConfig::new(10.0e6), 1000);
//! let output = train_1d_scan(&dataset, lattice, screen, 0, config, ExecutionContext::new(device))?;
//! save_beam("reconstruction.npz".as_ref(), &output.beam.to_dump()?)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! psr_core (pure math)
//!     │
//!     ├──────────────────┐
//!     ▼                  ▼
//!  psr_io           neural_psr
//! (storage)         (training)
//!     │                  │
//!     └──────────────────┘
//!        .npz / .json files
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `ndarray` (default): CPU backend using ndarray
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod beam;
pub mod config;
pub mod data;
pub mod error;
pub mod lattice;
pub mod loss;
pub mod model;
pub mod nn;
pub mod screen;
pub mod training;
pub mod virtual_scan;

// Re-export key types for convenience
pub use beam::{BeamGenerator, ParticleEnsemble};
pub use config::{GeneratorConfig, MentLossConfig, ScreenConfig, TrainingConfig};
pub use data::ScanDataset;
pub use error::{NeuralPsrError, Result};
pub use lattice::{Element, Lattice, Transport};
pub use loss::MentLoss;
pub use model::{ExecutionContext, ReconstructionModel};
pub use screen::{KdeScreen, Screen};
pub use training::{ReconstructionTrainer, TrainOutput};

// Re-export from psr_core and psr_io for convenience
pub use psr_core::{BaseDistribution, BeamMoments, PhaseCoord};
pub use psr_io::{load_beam, save_beam, BeamDump};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::beam::{BaseSampler, BeamGenerator, ParticleEnsemble};
    pub use crate::config::{
        CheckpointConfig, GeneratorConfig, MentLossConfig, NonFinitePolicy, ScreenConfig,
        TrainingConfig, TransformConfig,
    };
    pub use crate::data::ScanDataset;
    pub use crate::error::{NeuralPsrError, Result};
    pub use crate::lattice::{
        Element, ElementOverrides, ElementParameter, Lattice, PhaseSpace, ScanKnob, Transport,
    };
    pub use crate::loss::{
        gaussian_entropy, image_divergence, LagrangeMultiplier, LossComponents, LossOutput,
        MentLoss,
    };
    pub use crate::model::{ExecutionContext, ModelOutput, ReconstructionModel};
    pub use crate::nn::NnTransform;
    pub use crate::screen::{KdeScreen, Screen};
    pub use crate::training::{
        checkpoint_exists, find_latest_checkpoint, load_checkpoint, save_checkpoint,
        train_1d_scan, train_1d_scan_multi_device, train_1d_sextupole_scan, train_3d_scan,
        train_3d_scan_dual_screen, CheckpointMetadata, EpochMetrics, LossRecorder,
        ReconstructionTrainer, ScanBatcher, TrainOutput, TrainingObserver,
    };
    pub use crate::virtual_scan::{
        run_3d_scan, run_3d_scan_dual_screen, run_quad_scan, run_sextupole_scan, run_t_scan,
    };

    pub use psr_core::scan::linspace;
    pub use psr_core::{BaseDistribution, BeamMoments, PhaseCoord};
    pub use psr_io::{load_beam, save_beam, BeamDump};
}
