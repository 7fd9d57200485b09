//! Synthetic scan datasets.
//!
//! Each function tracks a known ground-truth ensemble through a lattice for
//! every configuration of a scan and records the screen images, producing a
//! dataset in exactly the layout a measured scan would have.

use std::path::Path;

use burn::prelude::*;

use psr_core::{DualScreenGrid, ScanGrid};

use crate::beam::ParticleEnsemble;
use crate::data::ScanDataset;
use crate::error::Result;
use crate::lattice::{ElementOverrides, ScanKnob, Transport};
use crate::screen::Screen;

fn settings<B: Backend, const D: usize>(
    values: &[f64],
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// Images `[M, ny, nx]` of `beam` for `M` rows of knob settings.
fn image_rows<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattice: &T,
    screen: &S,
    knobs: &[ScanKnob],
    rows: &[f64],
) -> Result<Tensor<B, 3>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    let m = rows.len() / knobs.len();
    let device = beam.coords().device();
    let overrides =
        ElementOverrides::from_settings(knobs, settings::<B, 2>(rows, [m, knobs.len()], &device))?;
    let state = lattice.track(beam, &overrides)?;
    Ok(screen.image(&state).detach())
}

fn finish<B: Backend>(dataset: ScanDataset<B>, save_as: Option<&Path>) -> Result<ScanDataset<B>> {
    if let Some(path) = save_as {
        dataset.save(path)?;
        log::info!("Dataset saved as {:?}", path);
    }
    Ok(dataset)
}

fn sweep<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattice: &T,
    screen: &S,
    knob: ScanKnob,
    values: &[f64],
    save_as: Option<&Path>,
) -> Result<ScanDataset<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    let grid = ScanGrid::sweep(values)?;
    let images = image_rows(beam, lattice, screen, &[knob], grid.as_flat())?;
    let dataset = ScanDataset::from_1d(
        settings(grid.as_flat(), [grid.len()], &beam.coords().device()),
        images.unsqueeze_dim(1),
    )?;
    finish(dataset, save_as)
}

fn grid_3d<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattice: &T,
    screen: &S,
    grid: &ScanGrid,
    [quad, deflector, bend]: [usize; 3],
    save_as: Option<&Path>,
) -> Result<ScanDataset<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    let knobs = [
        ScanKnob::quadrupole(quad),
        ScanKnob::deflector(deflector),
        ScanKnob::bend(bend),
    ];
    let images = image_rows(beam, lattice, screen, &knobs, grid.as_flat())?;
    let dataset = ScanDataset::from_3d(
        settings(grid.as_flat(), [grid.len(), 3], &beam.coords().device()),
        images.unsqueeze_dim(1),
    )?;
    finish(dataset, save_as)
}

/// Quadrupole scan: K1 of element `quad` over `ks`.
pub fn run_quad_scan<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattice: &T,
    screen: &S,
    ks: &[f64],
    quad: usize,
    save_as: Option<&Path>,
) -> Result<ScanDataset<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    sweep(beam, lattice, screen, ScanKnob::quadrupole(quad), ks, save_as)
}

/// Sextupole scan: K2 of element `sextupole` over `ks`.
pub fn run_sextupole_scan<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattice: &T,
    screen: &S,
    ks: &[f64],
    sextupole: usize,
    save_as: Option<&Path>,
) -> Result<ScanDataset<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    sweep(beam, lattice, screen, ScanKnob::sextupole(sextupole), ks, save_as)
}

/// Full 3D scan over the `ij` meshgrid of `ks × vs × gs`.
///
/// `ids` are the `[quad, deflector, bend]` element indices.
#[allow(clippy::too_many_arguments)]
pub fn run_3d_scan<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattice: &T,
    screen: &S,
    ks: &[f64],
    vs: &[f64],
    gs: &[f64],
    ids: [usize; 3],
    save_as: Option<&Path>,
) -> Result<ScanDataset<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    let grid = ScanGrid::meshgrid(ks, vs, gs)?;
    grid_3d(beam, lattice, screen, &grid, ids, save_as)
}

/// T-shaped scan: every `k` at `(vs[0], gs[0])`, then the three remaining
/// deflector/bend corners at `k = 0`.
#[allow(clippy::too_many_arguments)]
pub fn run_t_scan<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattice: &T,
    screen: &S,
    ks: &[f64],
    vs: [f64; 2],
    gs: [f64; 2],
    ids: [usize; 3],
    save_as: Option<&Path>,
) -> Result<ScanDataset<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    let grid = ScanGrid::t_scan(ks, vs, gs)?;
    grid_3d(beam, lattice, screen, &grid, ids, save_as)
}

/// 3D scan imaged on two screens.
///
/// Every `(k, v)` pair is tracked once with the bend at `gs[0]` through
/// `lattices[0]` onto `screens[0]` and once with the bend at `gs[1]`
/// through `lattices[1]` onto `screens[1]`. Each image is stored
/// `n_repeats` times.
#[allow(clippy::too_many_arguments)]
pub fn run_3d_scan_dual_screen<B, T, S>(
    beam: &ParticleEnsemble<B>,
    lattices: [&T; 2],
    screens: [&S; 2],
    ks: &[f64],
    vs: &[f64],
    gs: [f64; 2],
    n_repeats: usize,
    ids: [usize; 3],
    save_as: Option<&Path>,
) -> Result<ScanDataset<B>>
where
    B: Backend,
    T: Transport<B>,
    S: Screen<B>,
{
    let grid = DualScreenGrid::new(ks, vs, gs)?;
    let [quad, deflector, bend] = ids;
    let knobs = [
        ScanKnob::quadrupole(quad),
        ScanKnob::deflector(deflector),
        ScanKnob::bend(bend),
    ];

    let mut images = Vec::with_capacity(2);
    for screen_index in 0..2 {
        let rows: Vec<f64> = (0..grid.len())
            .flat_map(|i| grid.entry(i)[screen_index])
            .collect();
        images.push(image_rows(
            beam,
            lattices[screen_index],
            screens[screen_index],
            &knobs,
            &rows,
        )?);
    }

    let images: Tensor<B, 4> = Tensor::stack(images, 1);
    let [m, s, ny, nx] = images.dims();
    let images = images
        .unsqueeze_dim::<5>(2)
        .expand([m, s, n_repeats.max(1), ny, nx]);

    let dataset = ScanDataset::dual_screen(
        settings(&grid.to_flat(), [m, 2, 3], &beam.coords().device()),
        images,
    )?;
    finish(dataset, save_as)
}
