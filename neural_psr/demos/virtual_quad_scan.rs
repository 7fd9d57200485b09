//! Example: Reconstructing a beam from a simulated quadrupole scan.
//!
//! Workflow:
//! 1. Sample a correlated Gaussian ground-truth beam
//! 2. Record a virtual quadrupole scan on a KDE screen
//! 3. Train a generator with the MENT loss
//! 4. Compare the reconstructed moments with the ground truth
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run -p neural_psr --release --example virtual_quad_scan
//! ```
//!
//! Output files are saved to `demos/output/`.

use std::fs;
use std::path::Path;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use instant::Instant;
use rand::rngs::StdRng;
use rand::SeedableRng;

use neural_psr::prelude::*;

type MyBackend = Autodiff<NdArray>;

/// Output directory for generated files.
const OUTPUT_DIR: &str = "demos/output";

/// Reference momentum [eV/c].
const P0C: f64 = 10.0e6;

fn main() {
    env_logger::init();

    if let Err(e) = fs::create_dir_all(OUTPUT_DIR) {
        eprintln!("Warning: Could not create output directory: {}", e);
    }

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let device = NdArrayDevice::Cpu;

    println!("═══════════════════════════════════════════════════════════════");
    println!("        Beam Reconstruction from a Virtual Quad Scan");
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    // =========================================================================
    // Step 1: Ground truth
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 1: Sampling Ground-Truth Beam                          │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let mut cov = [[0.0; 6]; 6];
    let sigmas = [1e-3, 1e-3, 1e-3, 1e-3, 1e-3, 1e-3];
    for (i, s) in sigmas.iter().enumerate() {
        cov[i][i] = s * s;
    }
    // x-px correlation
    cov[0][1] = 5e-7;
    cov[1][0] = 5e-7;

    let truth_dist = BaseDistribution::gaussian([0.0; 6], &cov)?;
    let rows = truth_dist.sample(&mut StdRng::seed_from_u64(0), 100_000);
    let truth = ParticleEnsemble::<MyBackend>::from_rows(&rows, P0C, &device)?;
    let truth_moments = truth.moments()?;

    println!("  Particles:       {}", truth.len());
    println!("  σx:              {:.3e} m", truth_moments.rms(PhaseCoord::X));
    println!("  σy:              {:.3e} m", truth_moments.rms(PhaseCoord::Y));
    println!();

    // =========================================================================
    // Step 2: Virtual scan
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 2: Recording Virtual Quadrupole Scan                   │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let lattice = Lattice::new(vec![Element::quadrupole(0.1, 0.0), Element::drift(1.0)]);
    let screen = KdeScreen::new(&ScreenConfig::square(100, 1e-2))?;
    let ks = linspace(-25.0, 25.0, 10);

    let scan_path = Path::new(OUTPUT_DIR).join("quad_scan.npz");
    let dataset = run_quad_scan(&truth, &lattice, &screen, &ks, 0, Some(&scan_path))?;

    println!("  Configurations:  {}", dataset.len());
    println!("  Resolution:      {:?}", dataset.resolution());
    println!("  Saved to:        {:?}", scan_path);
    println!();

    // =========================================================================
    // Step 3: Training
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 3: Training Generator                                  │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let generator = GeneratorConfig::new(P0C).with_n_particles(10_000);
    let config = TrainingConfig::quad_scan(generator, 500)
        .with_log_interval(50)
        .with_checkpoint(
            CheckpointConfig::new()
                .with_output_dir(Some(OUTPUT_DIR.to_string()))
                .with_final_beam_file(Some("reconstruction.npz".into()))
                .with_loss_log_file(Some("loss.json".into())),
        );

    println!("  Epochs:          {}", config.n_epochs);
    println!("  Learning rate:   {}", config.learning_rate);
    println!("  Lambda:          {:.1e}", config.loss.lambda);
    println!();

    let start = Instant::now();
    let output = train_1d_scan(
        &dataset,
        lattice,
        screen,
        0,
        config,
        ExecutionContext::new(device),
    )?;
    let elapsed = start.elapsed();

    for (epoch, loss) in &output.history {
        println!("  Epoch {:>5}:     loss = {:.4}", epoch, loss);
    }
    println!("  Training time:   {:.2?}", elapsed);
    if output.skipped_steps > 0 {
        println!("  Skipped steps:   {}", output.skipped_steps);
    }
    println!();

    // =========================================================================
    // Step 4: Comparison
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 4: Comparing Moments                                   │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let moments = output.beam.moments()?;
    for coord in [PhaseCoord::X, PhaseCoord::Px, PhaseCoord::Y, PhaseCoord::Py] {
        println!(
            "  σ{:<16} truth = {:.3e}  reconstructed = {:.3e}",
            format!("{:?}:", coord),
            truth_moments.rms(coord),
            moments.rms(coord)
        );
    }
    println!(
        "  εx:              truth = {:.3e}  reconstructed = {:.3e}",
        truth_moments.emittance_2d(PhaseCoord::X, PhaseCoord::Px),
        moments.emittance_2d(PhaseCoord::X, PhaseCoord::Px)
    );
    println!();
    println!("Done. Outputs written to {}/", OUTPUT_DIR);

    Ok(())
}
