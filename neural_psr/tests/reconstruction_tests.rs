//! Integration tests for the forward model and virtual scans.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;

use neural_psr::prelude::*;

type TestBackend = Autodiff<NdArray>;

const P0C: f64 = 10.0e6;

fn gaussian_beam(sigma: f64, n: usize, seed: u64) -> ParticleEnsemble<TestBackend> {
    use rand::SeedableRng;

    let mut cov = [[0.0; 6]; 6];
    for (i, row) in cov.iter_mut().enumerate() {
        row[i] = sigma * sigma;
    }
    let base = BaseDistribution::gaussian([0.0; 6], &cov).unwrap();
    let rows = base.sample(&mut rand::rngs::StdRng::seed_from_u64(seed), n);
    ParticleEnsemble::from_rows(&rows, P0C, &NdArrayDevice::Cpu).unwrap()
}

/// quad (0) - drift - TDC (2) - drift - bend (4) - drift
fn lattice_3d() -> Lattice {
    Lattice::new(vec![
        Element::quadrupole(0.1, 0.0),
        Element::drift(0.5),
        Element::deflecting_cavity(0.3, 0.0, 2.856e9),
        Element::drift(0.5),
        Element::sector_bend(0.3, 0.0),
        Element::drift(1.0),
    ])
}

fn screen() -> KdeScreen {
    KdeScreen::new(&ScreenConfig::square(24, 2e-2)).unwrap()
}

/// Screen returning the same value in every pixel.
#[derive(Debug, Clone)]
struct ConstantScreen {
    value: f32,
    resolution: [usize; 2],
}

impl<B: Backend> Screen<B> for ConstantScreen {
    fn resolution(&self) -> [usize; 2] {
        self.resolution
    }

    fn image(&self, state: &PhaseSpace<B>) -> Tensor<B, 3> {
        let [ny, nx] = self.resolution;
        Tensor::full([state.n_configs(), ny, nx], self.value, &state.device())
    }
}

fn values<const D: usize>(tensor: Tensor<TestBackend, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().to_vec().unwrap()
}

#[test]
fn test_3d_scan_prediction_count() {
    let device = NdArrayDevice::Cpu;
    let beam = gaussian_beam(1e-3, 2000, 1);
    let ks = linspace(-10.0, 10.0, 3);
    let vs = [0.0, 1e6];
    let gs = [0.0, 1.0];

    let dataset = run_3d_scan(&beam, &lattice_3d(), &screen(), &ks, &vs, &gs, [0, 2, 4], None)
        .unwrap();
    assert_eq!(dataset.len(), ks.len() * vs.len() * gs.len());
    assert_eq!(dataset.n_knobs(), 3);

    let mut model = ReconstructionModel::<TestBackend>::scan_3d(
        &GeneratorConfig::new(P0C).with_n_particles(500),
        lattice_3d(),
        screen(),
        [0, 2, 4],
        ExecutionContext::new(device),
    )
    .unwrap();
    let output = model.forward(dataset.settings().clone()).unwrap();
    assert_eq!(output.images.dims(), [12, 1, 24, 24]);
}

#[test]
fn test_3d_scan_meshgrid_order() {
    let beam = gaussian_beam(1e-3, 500, 2);
    let dataset = run_3d_scan(
        &beam,
        &lattice_3d(),
        &screen(),
        &[1.0, 2.0],
        &[3.0, 4.0],
        &[0.0, 0.5],
        [0, 2, 4],
        None,
    )
    .unwrap();
    let settings = values(dataset.settings().clone());
    // ij order: the bend varies fastest, the quad slowest
    assert_eq!(&settings[0..3], &[1.0, 3.0, 0.0]);
    assert_eq!(&settings[3..6], &[1.0, 3.0, 0.5]);
    assert_eq!(&settings[6..9], &[1.0, 4.0, 0.0]);
    assert_eq!(&settings[21..24], &[2.0, 4.0, 0.5]);
}

#[test]
fn test_t_scan_layout() {
    let beam = gaussian_beam(1e-3, 500, 3);
    let dataset = run_t_scan(
        &beam,
        &lattice_3d(),
        &screen(),
        &[-1.0, 0.5, 1.0],
        [0.0, 1e6],
        [0.0, 1.0],
        [0, 2, 4],
        None,
    )
    .unwrap();
    assert_eq!(dataset.len(), 6);
    let settings = values(dataset.settings().clone());
    assert_eq!(&settings[9..12], &[0.0, 0.0, 1.0]);
    assert_eq!(&settings[12..15], &[0.0, 1e6, 0.0]);
    assert_eq!(&settings[15..18], &[0.0, 1e6, 1.0]);
}

#[test]
fn test_dual_screen_routing() {
    let device = NdArrayDevice::Cpu;
    let off = ConstantScreen {
        value: 1.0,
        resolution: [4, 6],
    };
    let on = ConstantScreen {
        value: 2.0,
        resolution: [4, 6],
    };

    let mut model = ReconstructionModel::<TestBackend, Lattice, ConstantScreen>::dual_screen(
        &GeneratorConfig::new(P0C).with_n_particles(100),
        [lattice_3d(), lattice_3d()],
        [off, on],
        [0, 2, 4],
        ExecutionContext::new(device),
    )
    .unwrap();

    let beam = gaussian_beam(1e-3, 100, 4);
    let dataset = run_3d_scan_dual_screen(
        &beam,
        [&lattice_3d(), &lattice_3d()],
        [&screen(), &screen()],
        &[-1.0, 0.0, 1.0],
        &[0.0, 1e6],
        [0.0, 1.0],
        2,
        [0, 2, 4],
        None,
    )
    .unwrap();
    assert_eq!(dataset.len(), 6);
    assert_eq!(dataset.images().dims(), [6, 2, 2, 24, 24]);

    let settings = values(dataset.settings().clone());
    for m in 0..6 {
        // bend off on screen 0, on on screen 1
        assert_eq!(settings[m * 6 + 2], 0.0);
        assert_eq!(settings[m * 6 + 5], 1.0);
    }

    let output = model.forward(dataset.settings().clone()).unwrap();
    assert_eq!(output.images.dims(), [6, 2, 4, 6]);
    let images = output.images;
    assert!(values(images.clone().slice([0..6, 0..1, 0..4, 0..6]))
        .iter()
        .all(|&v| v == 1.0));
    assert!(values(images.slice([0..6, 1..2, 0..4, 0..6]))
        .iter()
        .all(|&v| v == 2.0));
}

#[test]
fn test_quad_scan_images_change_with_strength() {
    let beam = gaussian_beam(1e-3, 3000, 5);
    let lattice = Lattice::new(vec![Element::quadrupole(0.1, 0.0), Element::drift(2.0)]);
    let dataset = run_quad_scan(&beam, &lattice, &screen(), &[-20.0, 0.0, 20.0], 0, None).unwrap();
    assert_eq!(dataset.images().dims(), [3, 1, 1, 24, 24]);

    let images = values(dataset.images().clone());
    let n = 24 * 24;
    let sum: f32 = images[..n].iter().sum();
    assert!((sum - 1.0).abs() < 1e-4);
    // focusing in x defocuses in y: the two extreme settings differ
    let diff: f32 = images[..n]
        .iter()
        .zip(&images[2 * n..])
        .map(|(a, b)| (a - b).abs())
        .sum();
    assert!(diff > 1e-2, "images identical across the scan");
}

#[test]
fn test_sextupole_scan_requires_sextupole() {
    let beam = gaussian_beam(1e-3, 100, 6);
    let lattice = Lattice::new(vec![Element::quadrupole(0.1, 0.0), Element::drift(1.0)]);
    let result = run_sextupole_scan(&beam, &lattice, &screen(), &[0.0, 1.0], 0, None);
    assert!(matches!(
        result,
        Err(NeuralPsrError::UnsupportedParameter { .. })
    ));

    let lattice = Lattice::new(vec![Element::sextupole(0.1, 0.0), Element::drift(1.0)]);
    let dataset = run_sextupole_scan(&beam, &lattice, &screen(), &[0.0, 1e3], 0, None).unwrap();
    assert_eq!(dataset.len(), 2);
}

#[test]
fn test_scan_dataset_save_load() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("scan.npz");
    let beam = gaussian_beam(1e-3, 500, 7);
    let lattice = Lattice::new(vec![Element::quadrupole(0.1, 0.0), Element::drift(1.0)]);

    let dataset =
        run_quad_scan(&beam, &lattice, &screen(), &[-1.0, 1.0], 0, Some(path.as_path())).unwrap();
    let loaded = ScanDataset::<TestBackend>::load(&path, &NdArrayDevice::Cpu).unwrap();
    assert_eq!(values(loaded.settings().clone()), values(dataset.settings().clone()));
    assert_eq!(values(loaded.images().clone()), values(dataset.images().clone()));
}
