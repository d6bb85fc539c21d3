//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be built from CLI
//! flags, handed to models and sinks, and logged without ceremony.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Keyword parameters passed to every model construction and fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitParams {
    /// Relative cutoff for singular values of the design (`σ_i <= rcond * σ_max`
    /// counts as zero).
    pub rcond: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self { rcond: 1e-12 }
    }
}

/// Where the iterator currently is when it asks for a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitContext {
    /// Zero-based position of the batch in source order.
    pub index: usize,
    pub n_samples: usize,
    /// Non-sample axes of the batch.
    pub spatial_shape: Vec<usize>,
}

impl UnitContext {
    /// Number of spatial elements flattened into model columns.
    pub fn n_units(&self) -> usize {
        self.spatial_shape.iter().product()
    }
}

/// Which derived quantity an output image holds.
///
/// Parsed from the CLI as:
///
/// - `beta` (all coefficients, one component per design column)
/// - `beta:<i>` (a single coefficient)
/// - `t:<c0,c1,..>` (t statistic of a contrast)
/// - `effect:<c0,c1,..>` (contrast estimate `cᵀβ`)
/// - `resid` (residuals, one component per sample)
/// - `sigma2` (residual variance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Coefficients,
    Coefficient(usize),
    TContrast(Vec<f64>),
    Effect(Vec<f64>),
    Residuals,
    Variance,
}

impl OutputKind {
    /// Components written per unit for a design with `n_params` columns and
    /// `n_samples` rows.
    pub fn nout(&self, n_params: usize, n_samples: usize) -> usize {
        match self {
            OutputKind::Coefficients => n_params,
            OutputKind::Residuals => n_samples,
            OutputKind::Coefficient(_)
            | OutputKind::TContrast(_)
            | OutputKind::Effect(_)
            | OutputKind::Variance => 1,
        }
    }

    /// File stem for the output image.
    pub fn basename(&self) -> String {
        match self {
            OutputKind::Coefficients => "beta".to_string(),
            OutputKind::Coefficient(i) => format!("beta_{i}"),
            OutputKind::TContrast(c) => format!("t_{}", join_weights(c, "_")),
            OutputKind::Effect(c) => format!("effect_{}", join_weights(c, "_")),
            OutputKind::Residuals => "resid".to_string(),
            OutputKind::Variance => "sigma2".to_string(),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Coefficients => write!(f, "beta"),
            OutputKind::Coefficient(i) => write!(f, "beta:{i}"),
            OutputKind::TContrast(c) => write!(f, "t:{}", join_weights(c, ",")),
            OutputKind::Effect(c) => write!(f, "effect:{}", join_weights(c, ",")),
            OutputKind::Residuals => write!(f, "resid"),
            OutputKind::Variance => write!(f, "sigma2"),
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (s, None),
        };
        match (name.to_ascii_lowercase().as_str(), arg) {
            ("beta", None) => Ok(OutputKind::Coefficients),
            ("beta", Some(i)) => i
                .parse::<usize>()
                .map(OutputKind::Coefficient)
                .map_err(|_| format!("Invalid coefficient index '{i}'.")),
            ("t", Some(c)) => parse_contrast(c).map(OutputKind::TContrast),
            ("effect", Some(c)) => parse_contrast(c).map(OutputKind::Effect),
            ("resid", None) => Ok(OutputKind::Residuals),
            ("sigma2", None) => Ok(OutputKind::Variance),
            _ => Err(format!(
                "Unknown output '{s}'. Expected beta, beta:<i>, t:<c,..>, effect:<c,..>, resid or sigma2."
            )),
        }
    }
}

fn parse_contrast(s: &str) -> Result<Vec<f64>, String> {
    let weights = s
        .split(',')
        .map(|w| {
            w.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("Invalid contrast weight '{w}'."))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if weights.iter().all(|w| *w == 0.0) {
        return Err("Contrast must have at least one non-zero weight.".to_string());
    }
    Ok(weights)
}

fn join_weights(c: &[f64], sep: &str) -> String {
    c.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(sep)
}

/// A full `vfit fit` configuration.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Observation volume `(n_samples, *volume_shape)`.
    pub data_path: PathBuf,
    pub design_path: PathBuf,
    /// Optional per-sample weights; switches the model to WLS.
    pub weights_path: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub outputs: Vec<OutputKind>,
    pub overwrite: bool,
    /// Planes per iteration unit along the first volume axis.
    pub slab_step: usize,
    /// Process one batch at a time instead of draining the source first.
    pub streaming: bool,
    pub params: FitParams,
}

/// Configuration for `vfit simulate`.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub out_path: PathBuf,
    pub design_path: PathBuf,
    pub volume_shape: Vec<usize>,
    pub n_samples: usize,
    pub seed: u64,
    pub noise_sd: f64,
    pub overwrite: bool,
}
