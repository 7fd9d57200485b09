//! Beamline elements.

use std::fmt;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use psr_core::types::SPEED_OF_LIGHT;

use super::{ElementOverrides, PhaseSpace};

/// A scannable element setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementParameter {
    /// Quadrupole gradient K1 [1/m²].
    K1,
    /// Sextupole gradient K2 [1/m³].
    K2,
    /// Deflecting-cavity voltage [V].
    Voltage,
    /// Bend curvature G [1/m].
    G,
}

impl fmt::Display for ElementParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementParameter::K1 => "K1",
            ElementParameter::K2 => "K2",
            ElementParameter::Voltage => "VOLTAGE",
            ElementParameter::G => "G",
        };
        f.write_str(name)
    }
}

/// A beamline element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    /// Field-free drift.
    Drift {
        /// Length [m].
        length: f64,
    },
    /// Thick quadrupole, integrated with drift-kick-drift slices.
    Quadrupole {
        /// Length [m].
        length: f64,
        /// Default gradient K1 [1/m²].
        k1: f64,
        /// Number of integration slices.
        slices: usize,
    },
    /// Thick sextupole, integrated with drift-kick-drift slices.
    Sextupole {
        /// Length [m].
        length: f64,
        /// Default gradient K2 [1/m³].
        k2: f64,
        /// Number of integration slices.
        slices: usize,
    },
    /// Vertical transverse deflecting cavity, modeled as a central thin kick.
    TransverseDeflectingCavity {
        /// Length [m].
        length: f64,
        /// Default voltage [V].
        voltage: f64,
        /// RF frequency [Hz].
        frequency: f64,
        /// RF phase [rad]; 0 is the zero crossing.
        phase: f64,
    },
    /// Horizontal sector bend.
    SectorBend {
        /// Arc length [m].
        length: f64,
        /// Default curvature G [1/m].
        g: f64,
    },
}

impl Element {
    /// Drift of the given length.
    pub fn drift(length: f64) -> Self {
        Element::Drift { length }
    }

    /// Quadrupole with four integration slices.
    pub fn quadrupole(length: f64, k1: f64) -> Self {
        Element::Quadrupole {
            length,
            k1,
            slices: 4,
        }
    }

    /// Sextupole with four integration slices.
    pub fn sextupole(length: f64, k2: f64) -> Self {
        Element::Sextupole {
            length,
            k2,
            slices: 4,
        }
    }

    /// Deflecting cavity at zero-crossing phase.
    pub fn deflecting_cavity(length: f64, voltage: f64, frequency: f64) -> Self {
        Element::TransverseDeflectingCavity {
            length,
            voltage,
            frequency,
            phase: 0.0,
        }
    }

    /// Sector bend.
    pub fn sector_bend(length: f64, g: f64) -> Self {
        Element::SectorBend { length, g }
    }

    /// Element kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Drift { .. } => "drift",
            Element::Quadrupole { .. } => "quadrupole",
            Element::Sextupole { .. } => "sextupole",
            Element::TransverseDeflectingCavity { .. } => "deflecting cavity",
            Element::SectorBend { .. } => "sector bend",
        }
    }

    /// Length [m].
    pub fn length(&self) -> f64 {
        match *self {
            Element::Drift { length }
            | Element::Quadrupole { length, .. }
            | Element::Sextupole { length, .. }
            | Element::TransverseDeflectingCavity { length, .. }
            | Element::SectorBend { length, .. } => length,
        }
    }

    /// Default value of a scannable parameter, `None` if the element has no
    /// such parameter.
    pub fn parameter(&self, parameter: ElementParameter) -> Option<f64> {
        match (self, parameter) {
            (Element::Quadrupole { k1, .. }, ElementParameter::K1) => Some(*k1),
            (Element::Sextupole { k2, .. }, ElementParameter::K2) => Some(*k2),
            (Element::TransverseDeflectingCavity { voltage, .. }, ElementParameter::Voltage) => {
                Some(*voltage)
            }
            (Element::SectorBend { g, .. }, ElementParameter::G) => Some(*g),
            _ => None,
        }
    }

    /// Track a batch through this element.
    ///
    /// `index` is the element's position in its lattice, used to look up
    /// overrides. Overrides must already be validated.
    pub(crate) fn track<B: Backend>(
        &self,
        index: usize,
        state: PhaseSpace<B>,
        overrides: &ElementOverrides<B>,
    ) -> PhaseSpace<B> {
        let setting = |parameter: ElementParameter, default: f64| {
            resolve(overrides, index, parameter, default, &state)
        };

        match *self {
            Element::Drift { length } => state.drift(length),
            Element::Quadrupole { length, k1, slices } => {
                let k1 = setting(ElementParameter::K1, k1);
                sliced(state, length, slices, |s, ds| s.quadrupole_kick(k1.clone(), ds))
            }
            Element::Sextupole { length, k2, slices } => {
                let k2 = setting(ElementParameter::K2, k2);
                sliced(state, length, slices, |s, ds| s.sextupole_kick(k2.clone(), ds))
            }
            Element::TransverseDeflectingCavity {
                length,
                voltage,
                frequency,
                phase,
            } => {
                let voltage = setting(ElementParameter::Voltage, voltage);
                let wavenumber = 2.0 * std::f64::consts::PI * frequency / SPEED_OF_LIGHT;
                state
                    .drift(0.5 * length)
                    .deflector_kick(voltage, wavenumber, phase)
                    .drift(0.5 * length)
            }
            Element::SectorBend { length, g } => {
                let g = setting(ElementParameter::G, g);
                state.sector_bend(g, length)
            }
        }
    }
}

/// Per-configuration value of a parameter as a `[configs, particles]` tensor.
fn resolve<B: Backend>(
    overrides: &ElementOverrides<B>,
    index: usize,
    parameter: ElementParameter,
    default: f64,
    state: &PhaseSpace<B>,
) -> Tensor<B, 2> {
    let shape = [state.n_configs(), state.n_particles()];
    match overrides.get(index, parameter) {
        Some(values) => values.clone().reshape([shape[0], 1]).expand(shape),
        None => Tensor::full(shape, default, &state.device()),
    }
}

/// Second-order drift-kick-drift integration over `slices` slices.
fn sliced<B: Backend>(
    mut state: PhaseSpace<B>,
    length: f64,
    slices: usize,
    kick: impl Fn(PhaseSpace<B>, f64) -> PhaseSpace<B>,
) -> PhaseSpace<B> {
    let slices = slices.max(1);
    let ds = length / slices as f64;
    for _ in 0..slices {
        state = kick(state.drift(0.5 * ds), ds).drift(0.5 * ds);
    }
    state
}
