//! Screen configuration.

use burn::config::Config;

/// Configuration of a KDE screen: pixel grid and kernel bandwidth.
///
/// Pixels are centered on `(center_x, center_y)`; the grid spans
/// `width_x × width_y` meters.
#[derive(Config, Debug)]
pub struct ScreenConfig {
    /// Number of horizontal pixels.
    pub nx: usize,
    /// Number of vertical pixels.
    pub ny: usize,
    /// Horizontal extent [m].
    pub width_x: f64,
    /// Vertical extent [m].
    pub width_y: f64,
    /// Horizontal center [m].
    #[config(default = 0.0)]
    pub center_x: f64,
    /// Vertical center [m].
    #[config(default = 0.0)]
    pub center_y: f64,
    /// Kernel bandwidth as a fraction of the pixel size.
    #[config(default = 0.5)]
    pub bandwidth_factor: f64,
}

impl ScreenConfig {
    /// Square screen with `n × n` pixels spanning `width` in both planes.
    pub fn square(n: usize, width: f64) -> Self {
        Self::new(n, n, width, width)
    }

    /// Horizontal pixel size [m].
    pub fn pixel_size_x(&self) -> f64 {
        self.width_x / self.nx as f64
    }

    /// Vertical pixel size [m].
    pub fn pixel_size_y(&self) -> f64 {
        self.width_y / self.ny as f64
    }

    /// Pixel center coordinates along x.
    pub fn bin_centers_x(&self) -> Vec<f64> {
        centers(self.nx, self.width_x, self.center_x)
    }

    /// Pixel center coordinates along y.
    pub fn bin_centers_y(&self) -> Vec<f64> {
        centers(self.ny, self.width_y, self.center_y)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.nx == 0 || self.ny == 0 {
            return Err(format!("screen must have pixels, got {}x{}", self.nx, self.ny));
        }
        if self.width_x <= 0.0 || self.width_y <= 0.0 {
            return Err("screen widths must be positive".into());
        }
        if self.bandwidth_factor <= 0.0 {
            return Err("bandwidth_factor must be positive".into());
        }
        Ok(())
    }
}

fn centers(n: usize, width: f64, center: f64) -> Vec<f64> {
    let step = width / n as f64;
    let start = center - 0.5 * width + 0.5 * step;
    (0..n).map(|i| start + step * i as f64).collect()
}
