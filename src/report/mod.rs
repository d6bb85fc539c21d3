//! Reporting utilities: volume statistics and formatted terminal output.

use ndarray::ArrayD;

pub mod format;

pub use format::*;

/// Summary statistics over the finite values of a volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub n_values: usize,
    /// Count of NaN/inf entries (excluded from the statistics below).
    pub n_nonfinite: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

pub fn volume_stats(data: &ArrayD<f64>) -> VolumeStats {
    let mut n_finite = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &v in data.iter().filter(|v| v.is_finite()) {
        n_finite += 1;
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    let mean = if n_finite > 0 { sum / n_finite as f64 } else { f64::NAN };
    if n_finite == 0 {
        min = f64::NAN;
        max = f64::NAN;
    }
    VolumeStats {
        n_values: data.len(),
        n_nonfinite: data.len() - n_finite,
        min,
        max,
        mean,
    }
}
