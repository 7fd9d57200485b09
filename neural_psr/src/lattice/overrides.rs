//! Per-configuration element settings.

use burn::prelude::*;

use crate::error::{NeuralPsrError, Result};

use super::ElementParameter;

/// A scanned setting: which element, which parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanKnob {
    /// Element index in the lattice.
    pub element: usize,
    /// Parameter of that element.
    pub parameter: ElementParameter,
}

impl ScanKnob {
    /// Knob on an arbitrary parameter.
    pub const fn new(element: usize, parameter: ElementParameter) -> Self {
        Self { element, parameter }
    }

    /// Quadrupole gradient of element `element`.
    pub const fn quadrupole(element: usize) -> Self {
        Self::new(element, ElementParameter::K1)
    }

    /// Sextupole gradient of element `element`.
    pub const fn sextupole(element: usize) -> Self {
        Self::new(element, ElementParameter::K2)
    }

    /// Deflecting-cavity voltage of element `element`.
    pub const fn deflector(element: usize) -> Self {
        Self::new(element, ElementParameter::Voltage)
    }

    /// Bend curvature of element `element`.
    pub const fn bend(element: usize) -> Self {
        Self::new(element, ElementParameter::G)
    }
}

/// Settings that replace lattice defaults for a batch of configurations.
///
/// Every entry holds one value per configuration (`[configs]`). A lattice
/// tracked with overrides produces `configs` output ensembles; with no
/// overrides it produces one.
#[derive(Debug, Clone)]
pub struct ElementOverrides<B: Backend> {
    n_configs: usize,
    entries: Vec<(ScanKnob, Tensor<B, 1>)>,
}

impl<B: Backend> ElementOverrides<B> {
    /// No overrides: a single configuration with lattice defaults.
    pub fn none() -> Self {
        Self {
            n_configs: 1,
            entries: Vec::new(),
        }
    }

    /// Empty override set for `n_configs` configurations.
    pub fn new(n_configs: usize) -> Self {
        Self {
            n_configs,
            entries: Vec::new(),
        }
    }

    /// Add an override; `values` must have one entry per configuration.
    pub fn with(mut self, knob: ScanKnob, values: Tensor<B, 1>) -> Result<Self> {
        let [n] = values.dims();
        if n != self.n_configs {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![self.n_configs],
                got: vec![n],
            });
        }
        if self.entries.iter().any(|(k, _)| *k == knob) {
            return Err(NeuralPsrError::config(format!(
                "duplicate override for element {} {}",
                knob.element, knob.parameter
            )));
        }
        self.entries.push((knob, values));
        Ok(self)
    }

    /// Overrides from a settings table `[configs, knobs]`, column `j`
    /// driving `knobs[j]`.
    pub fn from_settings(knobs: &[ScanKnob], settings: Tensor<B, 2>) -> Result<Self> {
        let [n_configs, n_knobs] = settings.dims();
        if n_knobs != knobs.len() {
            return Err(NeuralPsrError::ShapeMismatch {
                expected: vec![n_configs, knobs.len()],
                got: vec![n_configs, n_knobs],
            });
        }
        let mut overrides = Self::new(n_configs);
        for (j, knob) in knobs.iter().enumerate() {
            let column = settings.clone().slice([0..n_configs, j..j + 1]).reshape([n_configs]);
            overrides = overrides.with(*knob, column)?;
        }
        Ok(overrides)
    }

    /// Number of configurations.
    pub fn n_configs(&self) -> usize {
        self.n_configs
    }

    /// Override values for `(element, parameter)`, if any.
    pub fn get(&self, element: usize, parameter: ElementParameter) -> Option<&Tensor<B, 1>> {
        self.entries
            .iter()
            .find(|(k, _)| k.element == element && k.parameter == parameter)
            .map(|(_, v)| v)
    }

    /// All overridden knobs.
    pub fn knobs(&self) -> impl Iterator<Item = &ScanKnob> {
        self.entries.iter().map(|(k, _)| k)
    }
}
