//! Batched phase-space state.

use burn::prelude::*;

use crate::beam::ParticleEnsemble;
use crate::error::Result;

/// Below this bend angle the sector-bend map uses its series expansion.
const SMALL_ANGLE: f64 = 1e-2;

/// Particle coordinates for a batch of machine configurations.
///
/// Every coordinate is a `[configs, particles]` tensor: row `c` holds the
/// ensemble as seen by configuration `c`.
#[derive(Debug, Clone)]
pub struct PhaseSpace<B: Backend> {
    /// Horizontal position [m].
    pub x: Tensor<B, 2>,
    /// Horizontal momentum (normalized).
    pub px: Tensor<B, 2>,
    /// Vertical position [m].
    pub y: Tensor<B, 2>,
    /// Vertical momentum (normalized).
    pub py: Tensor<B, 2>,
    /// Longitudinal position [m].
    pub z: Tensor<B, 2>,
    /// Relative momentum deviation.
    pub pz: Tensor<B, 2>,
    /// Reference momentum [eV/c].
    pub p0c: f64,
}

impl<B: Backend> PhaseSpace<B> {
    /// Broadcast one ensemble to `n_configs` identical rows.
    pub fn broadcast(beam: &ParticleEnsemble<B>, n_configs: usize) -> Self {
        let n = beam.len();
        let column = |i: usize| {
            beam.coords()
                .clone()
                .slice([0..n, i..i + 1])
                .reshape([1, n])
                .expand([n_configs, n])
        };

        Self {
            x: column(0),
            px: column(1),
            y: column(2),
            py: column(3),
            z: column(4),
            pz: column(5),
            p0c: beam.p0c(),
        }
    }

    /// Number of configurations.
    pub fn n_configs(&self) -> usize {
        self.x.dims()[0]
    }

    /// Number of particles per configuration.
    pub fn n_particles(&self) -> usize {
        self.x.dims()[1]
    }

    /// Device holding the coordinates.
    pub fn device(&self) -> B::Device {
        self.x.device()
    }

    /// The ensemble seen by configuration `c`.
    pub fn configuration(&self, c: usize) -> Result<ParticleEnsemble<B>> {
        let n = self.n_particles();
        let row = |t: &Tensor<B, 2>| t.clone().slice([c..c + 1, 0..n]).reshape([n, 1]);
        let coords = Tensor::cat(
            vec![
                row(&self.x),
                row(&self.px),
                row(&self.y),
                row(&self.py),
                row(&self.z),
                row(&self.pz),
            ],
            1,
        );
        ParticleEnsemble::new(coords, self.p0c)
    }

    /// Field-free drift.
    ///
    /// Paraxial with chromatic focusing: `x += L px / (1 + δ)`; `z` picks up
    /// the second-order path-length difference.
    pub fn drift(self, length: f64) -> Self {
        let inv = self.pz.clone().add_scalar(1.0).recip();
        let px_eff = self.px.clone() * inv.clone();
        let py_eff = self.py.clone() * inv;

        let path = (px_eff.clone().powf_scalar(2.0) + py_eff.clone().powf_scalar(2.0))
            .mul_scalar(0.5 * length);

        Self {
            x: self.x + px_eff.mul_scalar(length),
            y: self.y + py_eff.mul_scalar(length),
            z: self.z - path,
            ..self
        }
    }

    /// Thin quadrupole kick of integrated strength `k1 · ds`.
    pub fn quadrupole_kick(self, k1: Tensor<B, 2>, ds: f64) -> Self {
        let k = (k1 / self.pz.clone().add_scalar(1.0)).mul_scalar(ds);
        Self {
            px: self.px - k.clone() * self.x.clone(),
            py: self.py + k * self.y.clone(),
            ..self
        }
    }

    /// Thin sextupole kick of integrated strength `k2 · ds`.
    pub fn sextupole_kick(self, k2: Tensor<B, 2>, ds: f64) -> Self {
        let k = (k2 / self.pz.clone().add_scalar(1.0)).mul_scalar(ds);
        let x2 = self.x.clone().powf_scalar(2.0);
        let y2 = self.y.clone().powf_scalar(2.0);
        let xy = self.x.clone() * self.y.clone();
        Self {
            px: self.px - (k.clone() * (x2 - y2)).mul_scalar(0.5),
            py: self.py + k * xy,
            ..self
        }
    }

    /// Thin vertical deflecting-cavity kick.
    ///
    /// `Δpy = (V/p0c) sin(k z + φ)` and the matching energy kick
    /// `Δδ = (V/p0c) k y cos(k z + φ)`, which keeps the map symplectic.
    pub fn deflector_kick(self, voltage: Tensor<B, 2>, wavenumber: f64, phase: f64) -> Self {
        let strength = voltage.div_scalar(self.p0c);
        let arg = self.z.clone().mul_scalar(wavenumber).add_scalar(phase);
        let dpy = strength.clone() * arg.clone().sin();
        let dpz = (strength * arg.cos() * self.y.clone()).mul_scalar(wavenumber);
        Self {
            py: self.py + dpy,
            pz: self.pz + dpz,
            ..self
        }
    }

    /// Linear sector-bend map with curvature `g` over `length`.
    ///
    /// Bends in the horizontal plane with dispersion. For `|g L|` below
    /// [`SMALL_ANGLE`] the trigonometric ratios switch to their series so
    /// that `g = 0` is finite and reduces to a linear drift.
    pub fn sector_bend(self, g: Tensor<B, 2>, length: f64) -> Self {
        let theta = g.clone().mul_scalar(length);
        let small = theta.clone().abs().lower_elem(SMALL_ANGLE);
        let safe_g = g.clone().mask_fill(small.clone(), 1.0);

        let sin = theta.clone().sin();
        let cos = theta.clone().cos();
        let theta2 = theta.clone().powf_scalar(2.0);

        // sin θ / g
        let r12 = (sin.clone() / safe_g.clone()).mask_where(
            small.clone(),
            theta2.clone().mul_scalar(-length / 6.0).add_scalar(length),
        );
        // (1 - cos θ) / g
        let r16 = (cos.clone().neg().add_scalar(1.0) / safe_g.clone()).mask_where(
            small.clone(),
            theta.clone().mul_scalar(0.5 * length)
                * theta2.clone().mul_scalar(-1.0 / 12.0).add_scalar(1.0),
        );
        // (θ - sin θ) / g
        let r56 = ((theta - sin.clone()) / safe_g).mask_where(
            small,
            theta2.clone().mul_scalar(length / 6.0) * theta2.mul_scalar(-1.0 / 20.0).add_scalar(1.0),
        );
        let r21 = g * sin.clone();

        let (x0, px0, delta) = (self.x, self.px, self.pz.clone());

        let x = cos.clone() * x0.clone() + r12 * px0.clone() + r16.clone() * delta.clone();
        let px = cos * px0.clone() - r21 * x0.clone() + sin.clone() * delta.clone();
        let z = self.z - sin * x0 - r16 * px0 - r56 * delta;
        let y = self.y + self.py.clone().mul_scalar(length);

        Self {
            x,
            px,
            y,
            z,
            py: self.py,
            pz: self.pz,
            p0c: self.p0c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn single(rows: &[f32]) -> PhaseSpace<TestBackend> {
        let device = Default::default();
        let beam = ParticleEnsemble::from_rows(rows, 10.0e6, &device).unwrap();
        PhaseSpace::broadcast(&beam, 1)
    }

    fn value(t: Tensor<TestBackend, 2>) -> f32 {
        t.into_data().to_vec::<f32>().unwrap()[0]
    }

    fn full(v: f64) -> Tensor<TestBackend, 2> {
        Tensor::full([1, 1], v, &Default::default())
    }

    #[test]
    fn test_broadcast_shapes() {
        let device = Default::default();
        let rows: Vec<f32> = (0..30).map(|i| i as f32).collect();
        let beam = ParticleEnsemble::<TestBackend>::from_rows(&rows, 1.0, &device).unwrap();
        let state = PhaseSpace::broadcast(&beam, 4);
        assert_eq!(state.n_configs(), 4);
        assert_eq!(state.n_particles(), 5);

        let back = state.configuration(2).unwrap();
        assert_eq!(back.to_rows().unwrap(), rows);
    }

    #[test]
    fn test_drift_moves_position() {
        let state = single(&[1e-3, 2e-3, 0.0, -1e-3, 0.0, 0.0]).drift(2.0);
        assert!((value(state.x) - 5e-3).abs() < 1e-7);
        assert!((value(state.y) + 2e-3).abs() < 1e-7);
    }

    #[test]
    fn test_drift_is_chromatic() {
        let state = single(&[0.0, 1e-3, 0.0, 0.0, 0.0, 0.1]).drift(1.0);
        assert!((value(state.x) - 1e-3 / 1.1).abs() < 1e-8);
    }

    #[test]
    fn test_quadrupole_kick_focuses_x_defocuses_y() {
        let state = single(&[1e-3, 0.0, 1e-3, 0.0, 0.0, 0.0]).quadrupole_kick(full(10.0), 0.1);
        assert!((value(state.px) + 1e-3).abs() < 1e-8);
        assert!((value(state.py) - 1e-3).abs() < 1e-8);
    }

    #[test]
    fn test_sextupole_kick() {
        let state = single(&[2e-3, 0.0, 1e-3, 0.0, 0.0, 0.0]).sextupole_kick(full(100.0), 0.1);
        // px -= k2 ds (x² - y²) / 2, py += k2 ds x y
        assert!((value(state.px) + 10.0 * 3e-6 / 2.0).abs() < 1e-9);
        assert!((value(state.py) - 10.0 * 2e-6).abs() < 1e-9);
    }

    #[test]
    fn test_deflector_streaks_by_z() {
        let k = 2.0 * std::f64::consts::PI * 2.856e9 / psr_core::types::SPEED_OF_LIGHT;
        let state = single(&[0.0, 0.0, 0.0, 0.0, 1e-4, 0.0])
            .deflector_kick(full(1.0e6), k, 0.0);
        let expected = 0.1 * (k * 1e-4).sin();
        assert!((value(state.py) as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_bend_zero_field_is_linear_drift() {
        let state = single(&[1e-3, 2e-3, 0.0, 1e-3, 0.0, 0.0]).sector_bend(full(0.0), 0.5);
        assert!((value(state.x) - 2e-3).abs() < 1e-8);
        assert!((value(state.px) - 2e-3).abs() < 1e-8);
        assert!((value(state.y) - 5e-4).abs() < 1e-8);
    }

    #[test]
    fn test_bend_dispersion() {
        let (g, l) = (1.0, 0.3);
        let state = single(&[0.0, 0.0, 0.0, 0.0, 0.0, 1e-2]).sector_bend(full(g), l);
        let expected = (1.0 - (g * l).cos()) / g * 1e-2;
        assert!((value(state.x) as f64 - expected).abs() < 1e-8);
    }

    /// (x, px, z) after a sector bend, in f64, from the trigonometric map.
    fn bend_closed_form(g: f64, l: f64, x0: f64, px0: f64, delta: f64) -> [f64; 3] {
        let theta = g * l;
        let (sin, cos) = theta.sin_cos();
        [
            cos * x0 + sin / g * px0 + (1.0 - cos) / g * delta,
            -g * sin * x0 + cos * px0 + sin * delta,
            -sin * x0 - (1.0 - cos) / g * px0 - (theta - sin) / g * delta,
        ]
    }

    fn assert_bend_matches_closed_form(g: f64, tol: f64) {
        let (l, x0, px0, delta) = (1.0, 1e-3, 1e-3, 1e-2);
        let state = single(&[x0 as f32, px0 as f32, 0.0, 0.0, 0.0, delta as f32])
            .sector_bend(full(g), l);
        let expected = bend_closed_form(g, l, x0, px0, delta);
        let got = [value(state.x), value(state.px), value(state.z)];
        for (name, (g_val, e)) in ["x", "px", "z"].iter().zip(got.iter().zip(expected)) {
            assert!(
                (*g_val as f64 - e).abs() < tol,
                "g = {}: {} = {} vs {}",
                g,
                name,
                g_val,
                e
            );
        }
    }

    #[test]
    fn test_bend_series_matches_closed_form_below_threshold() {
        let g = 0.99 * SMALL_ANGLE;
        assert!(g < SMALL_ANGLE);
        assert_bend_matches_closed_form(g, 1e-8);
    }

    #[test]
    fn test_bend_exact_branch_matches_closed_form_above_threshold() {
        // 1 - cos θ cancels in f32 at this angle
        let g = 1.01 * SMALL_ANGLE;
        assert_bend_matches_closed_form(g, 2e-7);
    }
}
