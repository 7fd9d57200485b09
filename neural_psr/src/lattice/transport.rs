//! Transport contract and the reference lattice.

use std::fmt::Debug;

use burn::prelude::*;

use crate::beam::ParticleEnsemble;
use crate::error::{NeuralPsrError, Result};

use super::{Element, ElementOverrides, PhaseSpace, ScanKnob};

/// Differentiable transport of a beam through a beamline.
///
/// Implementations must be pure: the same beam and overrides always give
/// the same output, and nothing about the transport itself changes.
pub trait Transport<B: Backend>: Clone + Debug {
    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the beamline has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that `knob` addresses an existing element and parameter.
    fn check_knob(&self, knob: &ScanKnob) -> Result<()>;

    /// Track `beam` for every configuration in `overrides`.
    fn track(
        &self,
        beam: &ParticleEnsemble<B>,
        overrides: &ElementOverrides<B>,
    ) -> Result<PhaseSpace<B>>;
}

/// Immutable sequence of elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lattice {
    elements: Vec<Element>,
}

impl Lattice {
    /// Create a lattice from its elements, upstream first.
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Append an element.
    pub fn with(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// The elements.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the lattice has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Total length [m].
    pub fn length(&self) -> f64 {
        self.elements.iter().map(Element::length).sum()
    }

    /// Copy of the lattice with one element replaced.
    pub fn with_element(&self, index: usize, element: Element) -> Result<Self> {
        if index >= self.elements.len() {
            return Err(NeuralPsrError::ElementIndexOutOfRange {
                index,
                len: self.elements.len(),
            });
        }
        let mut elements = self.elements.clone();
        elements[index] = element;
        Ok(Self { elements })
    }
}

impl<B: Backend> Transport<B> for Lattice {
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn check_knob(&self, knob: &ScanKnob) -> Result<()> {
        let element = self
            .elements
            .get(knob.element)
            .ok_or(NeuralPsrError::ElementIndexOutOfRange {
                index: knob.element,
                len: self.elements.len(),
            })?;
        if element.parameter(knob.parameter).is_none() {
            return Err(NeuralPsrError::UnsupportedParameter {
                index: knob.element,
                kind: element.kind(),
                parameter: knob.parameter,
            });
        }
        Ok(())
    }

    fn track(
        &self,
        beam: &ParticleEnsemble<B>,
        overrides: &ElementOverrides<B>,
    ) -> Result<PhaseSpace<B>> {
        for knob in overrides.knobs() {
            <Self as Transport<B>>::check_knob(self, knob)?;
        }

        let mut state = PhaseSpace::broadcast(beam, overrides.n_configs());
        for (index, element) in self.elements.iter().enumerate() {
            state = element.track(index, state, overrides);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::ElementParameter;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn quad_scan_lattice() -> Lattice {
        Lattice::new(vec![Element::quadrupole(0.1, 0.0), Element::drift(2.0)])
    }

    fn test_beam() -> ParticleEnsemble<TestBackend> {
        let rows = [
            1e-3, 0.0, 1e-3, 0.0, 0.0, 0.0, //
            -1e-3, 1e-4, 0.0, -1e-4, 0.0, 0.0, //
            0.0, 0.0, 5e-4, 0.0, 0.0, 0.0,
        ];
        ParticleEnsemble::from_rows(&rows, 10.0e6, &Default::default()).unwrap()
    }

    #[test]
    fn test_out_of_range_knob() {
        let lattice = quad_scan_lattice();
        let err = Transport::<TestBackend>::check_knob(&lattice, &ScanKnob::quadrupole(5));
        assert!(matches!(
            err,
            Err(NeuralPsrError::ElementIndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_unsupported_parameter() {
        let lattice = quad_scan_lattice();
        let err = Transport::<TestBackend>::check_knob(&lattice, &ScanKnob::bend(1));
        assert!(matches!(
            err,
            Err(NeuralPsrError::UnsupportedParameter {
                parameter: ElementParameter::G,
                ..
            })
        ));
    }

    #[test]
    fn test_track_rejects_bad_override() {
        let device = Default::default();
        let overrides = ElementOverrides::new(2)
            .with(ScanKnob::quadrupole(3), Tensor::zeros([2], &device))
            .unwrap();
        assert!(quad_scan_lattice().track(&test_beam(), &overrides).is_err());
    }

    #[test]
    fn test_overrides_do_not_touch_lattice() {
        let device = Default::default();
        let lattice = quad_scan_lattice();
        let before = lattice.clone();

        let overrides = ElementOverrides::new(3)
            .with(
                ScanKnob::quadrupole(0),
                Tensor::from_data([-10.0f32, 0.0, 10.0], &device),
            )
            .unwrap();
        let out = lattice.track(&test_beam(), &overrides).unwrap();

        assert_eq!(out.n_configs(), 3);
        assert_eq!(out.n_particles(), 3);
        assert_eq!(lattice, before);
    }

    #[test]
    fn test_zero_strength_equals_defaults() {
        let device = Default::default();
        let lattice = quad_scan_lattice();
        let beam = test_beam();

        let scanned = lattice
            .track(
                &beam,
                &ElementOverrides::new(1)
                    .with(ScanKnob::quadrupole(0), Tensor::zeros([1], &device))
                    .unwrap(),
            )
            .unwrap();
        let plain = lattice.track(&beam, &ElementOverrides::none()).unwrap();

        let a: Vec<f32> = scanned.x.into_data().to_vec().unwrap();
        let b: Vec<f32> = plain.x.into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_quadrupole_map_preserves_area() {
        // transfer matrix of the x plane from three reference particles
        let device = Default::default();
        let rows = [
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
            1e-3, 0.0, 0.0, 0.0, 0.0, 0.0, //
            0.0, 1e-3, 0.0, 0.0, 0.0, 0.0,
        ];
        let beam = ParticleEnsemble::<TestBackend>::from_rows(&rows, 1.0, &device).unwrap();
        let lattice = Lattice::new(vec![
            Element::drift(0.5),
            Element::quadrupole(0.2, 8.0),
            Element::drift(1.0),
        ]);
        let out = lattice.track(&beam, &ElementOverrides::none()).unwrap();

        let x: Vec<f32> = out.x.into_data().to_vec().unwrap();
        let px: Vec<f32> = out.px.into_data().to_vec().unwrap();
        let r11 = (x[1] - x[0]) as f64 / 1e-3;
        let r21 = (px[1] - px[0]) as f64 / 1e-3;
        let r12 = (x[2] - x[0]) as f64 / 1e-3;
        let r22 = (px[2] - px[0]) as f64 / 1e-3;

        let det = r11 * r22 - r12 * r21;
        assert!((det - 1.0).abs() < 1e-3, "det = {}", det);
    }
}
