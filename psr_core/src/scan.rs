//! Scan grids.
//!
//! A scan is a list of rows, one per machine configuration, each holding one
//! setting per scanned knob. Row order is the order in which configurations
//! are tracked and the order in which measured images must be stored.

use crate::error::PsrCoreError;

/// `n` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Cartesian product of three axes in `ij` order.
///
/// The first axis varies slowest: row `i·|b|·|c| + j·|c| + k` is
/// `(a[i], b[j], c[k])`.
pub fn meshgrid3(a: &[f64], b: &[f64], c: &[f64]) -> Vec<[f64; 3]> {
    let mut rows = Vec::with_capacity(a.len() * b.len() * c.len());
    for &x in a {
        for &y in b {
            for &z in c {
                rows.push([x, y, z]);
            }
        }
    }
    rows
}

/// T-shaped scan over (quad, deflector, bend).
///
/// Every quad strength at `(vs[0], gs[0])`, followed by the three remaining
/// deflector/bend corners with the quad switched off.
pub fn t_scan(ks: &[f64], vs: [f64; 2], gs: [f64; 2]) -> Vec<[f64; 3]> {
    let mut rows: Vec<[f64; 3]> = ks.iter().map(|&k| [k, vs[0], gs[0]]).collect();
    rows.push([0.0, vs[0], gs[1]]);
    rows.push([0.0, vs[1], gs[0]]);
    rows.push([0.0, vs[1], gs[1]]);
    rows
}

fn check_axis(values: &[f64], axis: &'static str) -> Result<(), PsrCoreError> {
    if values.is_empty() {
        Err(PsrCoreError::EmptyAxis { axis })
    } else {
        Ok(())
    }
}

/// Single-screen scan grid: `len()` rows of `n_knobs()` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanGrid {
    values: Vec<f64>,
    n_knobs: usize,
}

impl ScanGrid {
    /// One knob swept over `values`.
    pub fn sweep(values: &[f64]) -> Result<Self, PsrCoreError> {
        check_axis(values, "values")?;
        Ok(Self {
            values: values.to_vec(),
            n_knobs: 1,
        })
    }

    /// Full (quad, deflector, bend) meshgrid.
    pub fn meshgrid(ks: &[f64], vs: &[f64], gs: &[f64]) -> Result<Self, PsrCoreError> {
        check_axis(ks, "ks")?;
        check_axis(vs, "vs")?;
        check_axis(gs, "gs")?;
        Ok(Self::from_triples(&meshgrid3(ks, vs, gs)))
    }

    /// T-shaped (quad, deflector, bend) scan, see [`t_scan`].
    pub fn t_scan(ks: &[f64], vs: [f64; 2], gs: [f64; 2]) -> Result<Self, PsrCoreError> {
        check_axis(ks, "ks")?;
        Ok(Self::from_triples(&t_scan(ks, vs, gs)))
    }

    /// Build from explicit rows of equal width.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PsrCoreError> {
        let first = rows.first().ok_or(PsrCoreError::EmptyAxis { axis: "rows" })?;
        let n_knobs = first.len();
        if n_knobs == 0 {
            return Err(PsrCoreError::EmptyAxis { axis: "knobs" });
        }
        let mut values = Vec::with_capacity(rows.len() * n_knobs);
        for row in rows {
            if row.len() != n_knobs {
                return Err(PsrCoreError::InvalidShape {
                    expected: n_knobs,
                    got: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Ok(Self { values, n_knobs })
    }

    fn from_triples(rows: &[[f64; 3]]) -> Self {
        Self {
            values: rows.iter().flatten().copied().collect(),
            n_knobs: 3,
        }
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.values.len() / self.n_knobs
    }

    /// Whether the grid has no configurations.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Settings per configuration.
    pub fn n_knobs(&self) -> usize {
        self.n_knobs
    }

    /// Settings of configuration `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_knobs..(i + 1) * self.n_knobs]
    }

    /// Row-major `[len, n_knobs]` values.
    pub fn as_flat(&self) -> &[f64] {
        &self.values
    }
}

/// Dual-screen (quad, deflector, bend) grid.
///
/// Each of the `|ks|·|vs|` entries holds two rows: the first with the bend
/// at `gs[0]` (imaged on screen 0), the second at `gs[1]` (screen 1).
#[derive(Debug, Clone, PartialEq)]
pub struct DualScreenGrid {
    rows: Vec<[[f64; 3]; 2]>,
}

impl DualScreenGrid {
    /// Build from quad and deflector axes and the two bend settings.
    pub fn new(ks: &[f64], vs: &[f64], gs: [f64; 2]) -> Result<Self, PsrCoreError> {
        check_axis(ks, "ks")?;
        check_axis(vs, "vs")?;
        let mut rows = Vec::with_capacity(ks.len() * vs.len());
        for &k in ks {
            for &v in vs {
                rows.push([[k, v, gs[0]], [k, v, gs[1]]]);
            }
        }
        Ok(Self { rows })
    }

    /// Number of (quad, deflector) configurations.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Both rows of configuration `i`.
    pub fn entry(&self, i: usize) -> &[[f64; 3]; 2] {
        &self.rows[i]
    }

    /// Row-major `[len, 2, 3]` values.
    pub fn to_flat(&self) -> Vec<f64> {
        self.rows.iter().flatten().flatten().copied().collect()
    }
}
