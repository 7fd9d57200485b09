//! Configuration types for phase-space reconstruction.
//!
//! All configurations derive Burn's `Config`, so they come with `with_*`
//! builders and JSON `save`/`load`.

mod generator;
mod screen;
mod training;

pub use generator::{GeneratorConfig, TransformConfig};
pub use screen::ScreenConfig;
pub use training::{CheckpointConfig, MentLossConfig, NonFinitePolicy, TrainingConfig};
