//! Reconstruction model: generator → transport → screen.

mod context;
mod reconstruction;

pub use context::ExecutionContext;
pub use reconstruction::{ModelOutput, ReconstructionModel};
