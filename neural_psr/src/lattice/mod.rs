//! Differentiable particle transport.
//!
//! A [`Lattice`] is an immutable sequence of [`Element`]s. Scans never mutate
//! it: per-configuration settings are passed alongside the beam as
//! [`ElementOverrides`], and every configuration of a batch is tracked at
//! once on `[configs, particles]` tensors.

mod elements;
mod overrides;
mod phase_space;
mod transport;

pub use elements::{Element, ElementParameter};
pub use overrides::{ElementOverrides, ScanKnob};
pub use phase_space::PhaseSpace;
pub use transport::{Lattice, Transport};
