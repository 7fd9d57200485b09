//! Integration tests for reconstruction training.

use std::path::Path;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;

use neural_psr::prelude::*;

type TestBackend = Autodiff<NdArray>;

const P0C: f64 = 10.0e6;
const DEVICE: NdArrayDevice = NdArrayDevice::Cpu;

fn quad_lattice() -> Lattice {
    Lattice::new(vec![Element::quadrupole(0.1, 0.0), Element::drift(1.0)])
}

fn screen(width: f64) -> KdeScreen {
    KdeScreen::new(&ScreenConfig::square(32, width)).unwrap()
}

fn small_base_covariance(sigma: f64) -> Vec<f64> {
    let mut cov = vec![0.0; 36];
    for i in 0..6 {
        cov[i * 6 + i] = sigma * sigma;
    }
    cov
}

/// Unit spread in every plane except a narrow momentum spread.
fn unit_scale_covariance() -> Vec<f64> {
    let mut cov = small_base_covariance(1.0);
    cov[35] = 1e-6;
    cov
}

/// Screen covering unit-scale beams.
const UNIT_SCREEN_WIDTH: f64 = 16.0;

/// Generator that starts as the identity on a fixed unit-scale base sample.
fn identity_generator() -> GeneratorConfig {
    GeneratorConfig::identity(P0C)
        .with_transform(TransformConfig::identity().with_output_scale(1e-2))
        .with_n_particles(2000)
        .with_base_covariance(Some(unit_scale_covariance()))
        .with_resample_each_forward(false)
        .with_seed(11)
}

fn ground_truth(n: usize, seed: u64) -> ParticleEnsemble<TestBackend> {
    use rand::SeedableRng;

    let mut cov = [[0.0; 6]; 6];
    let sigmas = [1e-3, 1e-3, 2e-3, 5e-4, 1e-3, 1e-3];
    for (i, s) in sigmas.iter().enumerate() {
        cov[i][i] = s * s;
    }
    cov[0][1] = 2e-7;
    cov[1][0] = 2e-7;
    let base = BaseDistribution::gaussian([0.0; 6], &cov).unwrap();
    let rows = base.sample(&mut rand::rngs::StdRng::seed_from_u64(seed), n);
    ParticleEnsemble::from_rows(&rows, P0C, &DEVICE).unwrap()
}

fn quad_scan_dataset(width: f64) -> ScanDataset<TestBackend> {
    let ks = linspace(-25.0, 25.0, 6);
    run_quad_scan(&ground_truth(5000, 1), &quad_lattice(), &screen(width), &ks, 0, None).unwrap()
}

/// Dataset the identity generator reproduces exactly.
fn self_consistent_dataset(
    model: &mut ReconstructionModel<TestBackend>,
    ks: &[f64],
) -> ScanDataset<TestBackend> {
    let values: Vec<f32> = ks.iter().map(|&k| k as f32).collect();
    let settings: Tensor<TestBackend, 3> =
        Tensor::from_data(TensorData::new(values, [ks.len(), 1, 1]), &DEVICE);
    let images = model.forward(settings.clone()).unwrap().images.detach();
    ScanDataset::new(settings, images.unsqueeze_dim(2)).unwrap()
}

/// Screen producing NaN everywhere.
#[derive(Debug, Clone)]
struct NanScreen;

impl<B: Backend> Screen<B> for NanScreen {
    fn resolution(&self) -> [usize; 2] {
        [32, 32]
    }

    fn image(&self, state: &PhaseSpace<B>) -> Tensor<B, 3> {
        let x = state.x.clone().sum_dim(1).unsqueeze_dim::<3>(2);
        (x * f32::NAN).expand([state.n_configs(), 32, 32])
    }
}

/// Screen with finite images whose gradient is NaN (`d/dx sqrt(0·x)`).
#[derive(Debug, Clone)]
struct NanGradientScreen;

impl<B: Backend> Screen<B> for NanGradientScreen {
    fn resolution(&self) -> [usize; 2] {
        [32, 32]
    }

    fn image(&self, state: &PhaseSpace<B>) -> Tensor<B, 3> {
        let x = state.x.clone().sum_dim(1).unsqueeze_dim::<3>(2);
        x.mul_scalar(0.0)
            .sqrt()
            .add_scalar(1.0 / 1024.0)
            .expand([state.n_configs(), 32, 32])
    }
}

#[derive(Default)]
struct LambdaTrace {
    lambdas: Vec<f64>,
}

impl TrainingObserver for LambdaTrace {
    fn on_step(&mut self, _epoch: usize, _step: usize, components: &LossComponents) {
        self.lambdas.push(components.lambda);
    }
}

#[test]
fn test_identity_generator_matches_its_own_images() {
    let config = identity_generator();
    let mut model = ReconstructionModel::<TestBackend>::quad_scan(
        &config,
        quad_lattice(),
        screen(UNIT_SCREEN_WIDTH),
        0,
        ExecutionContext::new(DEVICE),
    )
    .unwrap();
    let dataset = self_consistent_dataset(&mut model, &linspace(-10.0, 10.0, 4));

    // default learning rate; a small λ lets the entropy term drive the steps
    let training = TrainingConfig::new(config)
        .with_n_epochs(3)
        .with_batch_size(2)
        .with_loss(MentLossConfig::new().with_lambda(1e-3));
    assert_eq!(training.learning_rate, 1e-2);
    let mut trainer = ReconstructionTrainer::new(model, training).unwrap();
    let mut recorder = LossRecorder::new();
    let output = trainer.fit(&dataset, &mut recorder).unwrap();

    assert_eq!(output.total_steps, 6);
    assert_eq!(recorder.len(), 6);
    let records = recorder.records();
    assert!(records[0].image_loss.abs() < 1e-5, "initial image loss {}", records[0].image_loss);
    for record in records {
        assert!(record.image_loss.abs() < 5e-2, "image loss {}", record.image_loss);
    }
    let (first, last) = (records[0].loss, records[records.len() - 1].loss);
    assert!(last < first, "loss did not decrease: {} -> {}", first, last);
}

#[test]
fn test_quad_scan_loss_decreases() {
    let dataset = quad_scan_dataset(3e-2);
    let generator = GeneratorConfig::new(P0C)
        .with_n_particles(1000)
        .with_resample_each_forward(false)
        .with_seed(5);
    let config = TrainingConfig::quad_scan(generator, 20)
        .with_batch_size(3)
        .with_log_interval(10);

    let mut recorder = LossRecorder::new();
    let model = ReconstructionModel::<TestBackend>::quad_scan(
        &config.generator,
        quad_lattice(),
        screen(3e-2),
        0,
        ExecutionContext::new(DEVICE),
    )
    .unwrap();
    let mut trainer = ReconstructionTrainer::new(model, config).unwrap();
    let output = trainer.fit(&dataset, &mut recorder).unwrap();

    assert_eq!(output.total_steps, 40);
    assert_eq!(output.history.len(), 2);
    assert_eq!(output.history[1].0, 20);
    assert_eq!(output.beam.len(), 1000);

    let records = recorder.records();
    let mean = |r: &[psr_io::LossRecord]| r.iter().map(|r| r.image_loss).sum::<f64>() / r.len() as f64;
    let early = mean(&records[..6]);
    let late = mean(&records[records.len() - 6..]);
    assert!(late < early, "image loss did not decrease: {} -> {}", early, late);
}

#[test]
fn test_non_finite_loss_is_skipped() {
    let generator = GeneratorConfig::new(P0C).with_n_particles(200);
    let dataset = quad_scan_dataset(1e-2);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(2)
        .with_batch_size(3)
        .with_non_finite(NonFinitePolicy::Skip);

    let output =
        train_1d_scan(&dataset, quad_lattice(), NanScreen, 0, config, ExecutionContext::new(DEVICE))
            .unwrap();
    assert_eq!(output.total_steps, 0);
    assert_eq!(output.skipped_steps, 4);
    assert_eq!(output.beam.len(), 200);
}

#[test]
fn test_non_finite_loss_aborts() {
    let generator = GeneratorConfig::new(P0C).with_n_particles(200);
    let dataset = quad_scan_dataset(1e-2);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(2)
        .with_non_finite(NonFinitePolicy::Abort);

    let result =
        train_1d_scan(&dataset, quad_lattice(), NanScreen, 0, config, ExecutionContext::new(DEVICE));
    assert!(matches!(
        result,
        Err(NeuralPsrError::NonFiniteLoss { epoch: 1, step: 1, .. })
    ));
}

#[test]
fn test_trainable_lambda_stays_positive() {
    let dataset = quad_scan_dataset(3e-2);
    let generator = GeneratorConfig::new(P0C).with_n_particles(500);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(3)
        .with_batch_size(2)
        .with_loss(
            MentLossConfig::new()
                .with_lambda(1.0)
                .with_trainable_lambda(true)
                .with_lambda_step(0.5),
        );

    let model = ReconstructionModel::<TestBackend>::quad_scan(
        &config.generator,
        quad_lattice(),
        screen(3e-2),
        0,
        ExecutionContext::new(DEVICE),
    )
    .unwrap();
    let mut trainer = ReconstructionTrainer::new(model, config).unwrap();
    let mut trace = LambdaTrace::default();
    let output = trainer.fit(&dataset, &mut trace).unwrap();

    assert_eq!(trace.lambdas.len(), 9);
    assert!(trace.lambdas.iter().all(|&l| l > 0.0 && l.is_finite()));
    // image loss above a zero target only pushes λ up
    assert!(output.lambda > 1.0);
}

#[test]
fn test_multi_device_training_runs() {
    let dataset = quad_scan_dataset(3e-2);
    let generator = GeneratorConfig::new(P0C).with_n_particles(400);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(2)
        .with_batch_size(4)
        .with_log_interval(1);

    let output = train_1d_scan_multi_device(
        &dataset,
        quad_lattice(),
        screen(3e-2),
        0,
        config,
        DEVICE,
        vec![DEVICE, DEVICE],
    )
    .unwrap();
    assert_eq!(output.total_steps, 4);
    assert_eq!(output.history.len(), 2);
    assert!(output.history.iter().all(|(_, loss)| loss.is_finite()));
}

/// Loss components of the first evaluation, before any optimizer step.
fn first_evaluation(replicas: Vec<NdArrayDevice>) -> psr_io::LossRecord {
    let dataset = quad_scan_dataset(3e-2);
    let generator = GeneratorConfig::new(P0C).with_n_particles(400).with_seed(8);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(1)
        .with_batch_size(dataset.len())
        .with_loss(MentLossConfig::new().with_lambda(1.0));
    let model = ReconstructionModel::<TestBackend>::quad_scan(
        &config.generator,
        quad_lattice(),
        screen(3e-2),
        0,
        ExecutionContext::new(DEVICE).with_replicas(replicas),
    )
    .unwrap();
    let mut trainer = ReconstructionTrainer::new(model, config).unwrap();
    let mut recorder = LossRecorder::new();
    trainer.fit(&dataset, &mut recorder).unwrap();
    recorder.records()[0]
}

#[test]
fn test_sharding_does_not_change_the_loss() {
    let single = first_evaluation(Vec::new());
    let one_replica = first_evaluation(vec![DEVICE]);
    let two_replicas = first_evaluation(vec![DEVICE, DEVICE]);
    let three_replicas = first_evaluation(vec![DEVICE, DEVICE, DEVICE]);

    let close = |a: f64, b: f64| (a - b).abs() <= 1e-4 * a.abs().max(b.abs()).max(1.0);
    assert!(single.image_loss > 0.0);
    for sharded in [one_replica, two_replicas, three_replicas] {
        assert!(
            close(single.image_loss, sharded.image_loss),
            "image loss {} vs {}",
            single.image_loss,
            sharded.image_loss
        );
        assert!(close(single.entropy_loss, sharded.entropy_loss));
        assert!(close(single.loss, sharded.loss), "loss {} vs {}", single.loss, sharded.loss);
    }
}

#[test]
fn test_non_finite_gradient_is_skipped() {
    let generator = GeneratorConfig::new(P0C).with_n_particles(200);
    let dataset = quad_scan_dataset(1e-2);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(2)
        .with_batch_size(3)
        .with_non_finite(NonFinitePolicy::Skip);

    let untrained = ReconstructionModel::<TestBackend, Lattice, NanGradientScreen>::quad_scan(
        &config.generator,
        quad_lattice(),
        NanGradientScreen,
        0,
        ExecutionContext::new(DEVICE),
    )
    .unwrap();
    let mut trainer = ReconstructionTrainer::new(untrained.snapshot(), config).unwrap();
    let mut recorder = LossRecorder::new();
    let output = trainer.fit(&dataset, &mut recorder).unwrap();

    assert_eq!(output.total_steps, 0);
    assert_eq!(output.skipped_steps, 4);
    assert_eq!(recorder.len(), 4);
    assert_eq!(recorder.n_skipped(), 4);
    assert!(recorder.records().iter().all(|r| r.loss.is_finite()));

    // the generator keeps its initial parameters
    let rows = output.beam.to_rows().unwrap();
    assert!(rows.iter().all(|v| v.is_finite()));
    assert_eq!(rows, untrained.sample_beam(200).unwrap().to_rows().unwrap());
}

#[test]
fn test_non_finite_gradient_aborts() {
    let generator = GeneratorConfig::new(P0C).with_n_particles(200);
    let dataset = quad_scan_dataset(1e-2);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(2)
        .with_non_finite(NonFinitePolicy::Abort);

    let result = train_1d_scan(
        &dataset,
        quad_lattice(),
        NanGradientScreen,
        0,
        config,
        ExecutionContext::new(DEVICE),
    );
    assert!(matches!(
        result,
        Err(NeuralPsrError::NonFiniteGradient { epoch: 1, step: 1 })
    ));
}

#[test]
fn test_skipped_steps_are_logged() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let generator = GeneratorConfig::new(P0C).with_n_particles(200);
    let dataset = quad_scan_dataset(1e-2);
    let config = TrainingConfig::new(generator)
        .with_n_epochs(2)
        .with_batch_size(3)
        .with_checkpoint(
            CheckpointConfig::new()
                .with_output_dir(Some(temp_dir.path().to_string_lossy().into_owned()))
                .with_loss_log_file(Some("loss.json".into())),
        );

    let output =
        train_1d_scan(&dataset, quad_lattice(), NanScreen, 0, config, ExecutionContext::new(DEVICE))
            .unwrap();
    assert_eq!(output.skipped_steps, 4);

    let log = psr_io::read_loss_log(&temp_dir.path().join("loss.json")).unwrap();
    assert_eq!(log.len(), 4);
    assert!(log.iter().all(|r| r.skipped && r.loss.is_nan()));
    assert_eq!(log.iter().map(|r| r.step).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
}

fn train_with_snapshots(output_dir: Option<&Path>) -> TrainOutput<TestBackend> {
    let dataset = quad_scan_dataset(3e-2);
    let generator = GeneratorConfig::new(P0C).with_n_particles(300).with_seed(2);
    let mut checkpoint = CheckpointConfig::new();
    if let Some(dir) = output_dir {
        checkpoint = checkpoint
            .with_output_dir(Some(dir.to_string_lossy().into_owned()))
            .with_snapshot_every(2)
            .with_snapshot_particles(500)
            .with_save_generator(true)
            .with_final_beam_file(Some("final.npz".into()))
            .with_loss_log_file(Some("loss.json".into()));
    }
    let config = TrainingConfig::new(generator)
        .with_n_epochs(4)
        .with_batch_size(3)
        .with_checkpoint(checkpoint);
    train_1d_scan(&dataset, quad_lattice(), screen(3e-2), 0, config, ExecutionContext::new(DEVICE))
        .unwrap()
}

#[test]
fn test_snapshots_are_deterministic() {
    let first = tempfile::TempDir::new().unwrap();
    let second = tempfile::TempDir::new().unwrap();

    let a = train_with_snapshots(Some(first.path()));
    let b = train_with_snapshots(Some(second.path()));
    let plain = train_with_snapshots(None);

    for epoch in [2, 4] {
        let path_a = psr_io::snapshot_path(first.path(), "dist", epoch);
        let path_b = psr_io::snapshot_path(second.path(), "dist", epoch);
        let dump_a = load_beam(&path_a).unwrap();
        let dump_b = load_beam(&path_b).unwrap();
        assert_eq!(dump_a.len(), 500);
        assert_eq!(dump_a, dump_b);
    }
    assert!(!psr_io::snapshot_path(first.path(), "dist", 3).exists());

    // snapshots must not perturb the run itself
    assert_eq!(a.beam.to_rows().unwrap(), b.beam.to_rows().unwrap());
    assert_eq!(a.beam.to_rows().unwrap(), plain.beam.to_rows().unwrap());

    let final_beam = load_beam(&first.path().join("final.npz")).unwrap();
    assert_eq!(final_beam.to_rows(), a.beam.to_rows().unwrap());
    let log = psr_io::read_loss_log(&first.path().join("loss.json")).unwrap();
    assert_eq!(log.len(), a.total_steps + a.skipped_steps);
}

#[test]
fn test_snapshot_checkpoints_can_be_resumed() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let output = train_with_snapshots(Some(temp_dir.path()));

    let latest = find_latest_checkpoint(temp_dir.path()).unwrap();
    assert!(latest.ends_with("checkpoint_4"));
    assert!(checkpoint_exists(&latest));

    let (generator, _, config, metadata) =
        load_checkpoint::<TestBackend>(&latest, &DEVICE).unwrap();
    assert_eq!(metadata.epoch, 4);
    assert_eq!(metadata.total_steps, output.total_steps);
    assert_eq!(config.n_epochs, 4);

    // the restored generator reproduces the final beam
    let model = ReconstructionModel::<TestBackend>::quad_scan(
        &config.generator,
        quad_lattice(),
        screen(3e-2),
        0,
        ExecutionContext::new(DEVICE),
    )
    .unwrap()
    .with_generator(generator);
    let beam = model.sample_beam(300).unwrap();
    assert_eq!(beam.to_rows().unwrap(), output.beam.to_rows().unwrap());
}

#[test]
fn test_dataset_model_mismatch_is_rejected() {
    let dataset = quad_scan_dataset(3e-2);
    let generator = GeneratorConfig::new(P0C).with_n_particles(100);
    let config = TrainingConfig::new(generator).with_n_epochs(1);
    let lattice = Lattice::new(vec![
        Element::quadrupole(0.1, 0.0),
        Element::drift(0.5),
        Element::deflecting_cavity(0.3, 0.0, 2.856e9),
        Element::drift(0.5),
        Element::sector_bend(0.3, 0.0),
        Element::drift(1.0),
    ]);
    let result = train_3d_scan(
        &dataset,
        lattice,
        screen(3e-2),
        [0, 2, 4],
        config,
        ExecutionContext::new(DEVICE),
    );
    assert!(matches!(result, Err(NeuralPsrError::ShapeMismatch { .. })));
}

/// Mean and covariance of a correlated unit-scale Gaussian beam.
fn unit_scale_truth() -> ([f64; 6], [[f64; 6]; 6]) {
    let mean = [0.2, 0.0, -0.1, 0.0, 0.0, 0.0];
    let sigmas = [1.0, 0.8, 1.2, 0.6, 1.0, 1e-3];
    let mut cov = [[0.0; 6]; 6];
    for (i, s) in sigmas.iter().enumerate() {
        cov[i][i] = s * s;
    }
    cov[0][1] = 0.3 * sigmas[0] * sigmas[1];
    cov[1][0] = cov[0][1];
    cov[2][3] = -0.2 * sigmas[2] * sigmas[3];
    cov[3][2] = cov[2][3];
    (mean, cov)
}

/// Check transverse centroids, rms sizes and in-plane correlations against
/// `mean` and `cov`; centroids are measured in units of the rms size.
fn assert_transverse_moments(
    got: &BeamMoments,
    mean: &[f64; 6],
    cov: &[[f64; 6]; 6],
    tol: f64,
) {
    for (a, b) in [(PhaseCoord::X, PhaseCoord::Px), (PhaseCoord::Y, PhaseCoord::Py)] {
        for coord in [a, b] {
            let i = coord.index();
            let rms = cov[i][i].sqrt();
            let offset = (got.mean[i] - mean[i]).abs();
            assert!(offset < tol * rms, "{:?}: centroid off by {}", coord, offset);
            let size = got.rms(coord);
            assert!((size - rms).abs() / rms < tol, "{:?}: rms {} vs {}", coord, size, rms);
        }
        let (i, j) = (a.index(), b.index());
        let expected = cov[i][j] / (cov[i][i] * cov[j][j]).sqrt();
        let corr = got.covariance[i][j] / (got.rms(a) * got.rms(b));
        assert!(
            (corr - expected).abs() < tol,
            "{:?}-{:?}: correlation {} vs {}",
            a,
            b,
            corr,
            expected
        );
    }
}

#[test]
fn test_quad_scan_recovers_moments_from_warm_start() {
    use rand::SeedableRng;

    let (mean, cov) = unit_scale_truth();
    let truth_base = BaseDistribution::gaussian(mean, &cov).unwrap();
    let rows = truth_base.sample(&mut rand::rngs::StdRng::seed_from_u64(21), 20_000);
    let truth = ParticleEnsemble::<TestBackend>::from_rows(&rows, P0C, &DEVICE).unwrap();

    let ks = linspace(-10.0, 10.0, 5);
    let dataset =
        run_quad_scan(&truth, &quad_lattice(), &screen(UNIT_SCREEN_WIDTH), &ks, 0, None).unwrap();

    // generator starts on the right distribution family, with its own samples
    let generator = GeneratorConfig::identity(P0C)
        .with_transform(TransformConfig::identity().with_output_scale(5e-3))
        .with_base_mean(mean.to_vec())
        .with_base_covariance(Some(cov.iter().flatten().copied().collect()))
        .with_n_particles(10_000)
        .with_resample_each_forward(false)
        .with_seed(4);
    let config = TrainingConfig::quad_scan(generator, 8).with_batch_size(5);
    let output = train_1d_scan(
        &dataset,
        quad_lattice(),
        screen(UNIT_SCREEN_WIDTH),
        0,
        config,
        ExecutionContext::new(DEVICE),
    )
    .unwrap();

    assert_eq!(output.total_steps, 8);
    assert_eq!(output.skipped_steps, 0);
    assert_transverse_moments(&output.beam.moments().unwrap(), &mean, &cov, 0.05);
}

/// Full 5-quad-setting reconstruction from scratch; slow on the CPU backend.
#[test]
#[ignore]
fn test_quad_scan_recovers_beam_moments() {
    let truth = ground_truth(100_000, 3);
    let ks = linspace(-25.0, 25.0, 5);
    let dataset = run_quad_scan(&truth, &quad_lattice(), &screen(2e-2), &ks, 0, None).unwrap();

    let generator = GeneratorConfig::new(P0C).with_n_particles(10_000);
    let config = TrainingConfig::quad_scan(generator, 1500).with_batch_size(5);
    let output =
        train_1d_scan(&dataset, quad_lattice(), screen(2e-2), 0, config, ExecutionContext::new(DEVICE))
            .unwrap();

    let expected = truth.moments().unwrap();
    assert_transverse_moments(
        &output.beam.moments().unwrap(),
        &expected.mean,
        &expected.covariance,
        0.05,
    );
}
