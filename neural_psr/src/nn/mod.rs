//! Neural network building blocks.

mod transform;

pub use transform::{seeded_linear, NnTransform};
