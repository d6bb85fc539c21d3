//! Synthetic observation volumes with known coefficients.
//!
//! The generated design has three columns:
//!
//! - `intercept`: constant 1
//! - `trend`: sample index scaled to `[0, 1]`
//! - `task`: a boxcar that alternates on/off every `TASK_BLOCK` samples
//!
//! True coefficients vary smoothly over the volume so fitted maps are easy to
//! eyeball: the intercept grows along the first axis, the trend along the
//! second and the task effect along the last.

use nalgebra::DMatrix;
use ndarray::{ArrayD, Dimension, IxDyn};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::SimulateConfig;
use crate::error::{Error, Result};

/// Samples per on/off block of the task regressor.
const TASK_BLOCK: usize = 4;

/// Baseline signal level shared by every voxel.
const BASELINE: f64 = 100.0;

pub const DESIGN_COLUMNS: [&str; 3] = ["intercept", "trend", "task"];

#[derive(Debug, Clone)]
pub struct SampleVolume {
    /// `(n_samples, *volume_shape)`.
    pub data: ArrayD<f64>,
    /// `n_samples × 3`.
    pub design: DMatrix<f64>,
    /// `(3, *volume_shape)`.
    pub betas: ArrayD<f64>,
}

pub fn generate_volume(config: &SimulateConfig) -> Result<SampleVolume> {
    if config.volume_shape.is_empty() || config.volume_shape.contains(&0) {
        return Err(Error::InvalidInput(format!(
            "volume shape {:?} must have at least one non-empty axis",
            config.volume_shape
        )));
    }
    if config.n_samples <= DESIGN_COLUMNS.len() {
        return Err(Error::InvalidInput(format!(
            "need more than {} samples to leave residual degrees of freedom",
            DESIGN_COLUMNS.len()
        )));
    }
    if !(config.noise_sd.is_finite() && config.noise_sd >= 0.0) {
        return Err(Error::InvalidInput("noise standard deviation must be finite and >= 0".into()));
    }

    let design = build_design(config.n_samples);
    let betas = true_betas(&config.volume_shape);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise_sd)
        .map_err(|e| Error::InvalidInput(format!("noise distribution error: {e}")))?;

    let mut shape = Vec::with_capacity(config.volume_shape.len() + 1);
    shape.push(config.n_samples);
    shape.extend_from_slice(&config.volume_shape);

    // Row-major fill: sample index is the slowest axis.
    let data = ArrayD::from_shape_fn(IxDyn(&shape), |ix| {
        let i = ix[0];
        let mut beta_ix: Vec<usize> = Vec::with_capacity(shape.len());
        beta_ix.push(0);
        beta_ix.extend(ix.slice()[1..].iter().copied());

        let mut y = 0.0;
        for k in 0..DESIGN_COLUMNS.len() {
            beta_ix[0] = k;
            y += design[(i, k)] * betas[beta_ix.as_slice()];
        }
        y + normal.sample(&mut rng)
    });

    Ok(SampleVolume { data, design, betas })
}

fn build_design(n: usize) -> DMatrix<f64> {
    let denom = (n - 1).max(1) as f64;
    DMatrix::from_fn(n, DESIGN_COLUMNS.len(), |i, j| match j {
        0 => 1.0,
        1 => i as f64 / denom,
        _ => ((i / TASK_BLOCK) % 2) as f64,
    })
}

fn true_betas(volume_shape: &[usize]) -> ArrayD<f64> {
    let mut shape = Vec::with_capacity(volume_shape.len() + 1);
    shape.push(DESIGN_COLUMNS.len());
    shape.extend_from_slice(volume_shape);

    let last = volume_shape.len() - 1;
    let frac = |extent: usize, at: usize| if extent > 1 { at as f64 / (extent - 1) as f64 } else { 0.0 };

    ArrayD::from_shape_fn(IxDyn(&shape), |ix| {
        let k = ix[0];
        match k {
            0 => BASELINE + ix[1] as f64,
            1 => {
                let axis = 1.min(last);
                2.0 * frac(volume_shape[axis], ix[axis + 1])
            }
            _ => 5.0 * frac(volume_shape[last], ix[last + 1]),
        }
    })
}
