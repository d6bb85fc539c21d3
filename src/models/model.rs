//! Model capabilities and the results they produce.
//!
//! The iterator relies on two capabilities:
//! - build a model for the current iteration unit (`ModelFactory`)
//! - fit that model to a `(n_samples, n_units)` data block (`LinearModel`)
//!
//! Models never see spatial shapes; the iterator flattens every batch before
//! handing it over and reshapes extracted results afterwards.

use nalgebra::DMatrix;
use ndarray::ArrayView2;

use crate::domain::{FitParams, UnitContext};
use crate::error::{Error, Result};

/// A statistical model that can be fitted to a flattened data block.
pub trait LinearModel {
    type Results;

    /// Fit every column of `data` (`n_samples × n_units`).
    fn fit(&self, data: ArrayView2<'_, f64>, params: &FitParams) -> Result<Self::Results>;
}

/// Builds a fresh model for each iteration unit.
///
/// The provided method fails with [`Error::NotImplemented`]; every concrete
/// factory overrides it.
pub trait ModelFactory {
    type Model: LinearModel;

    fn model(&mut self, unit: &UnitContext, params: &FitParams) -> Result<Self::Model> {
        let _ = (unit, params);
        Err(Error::NotImplemented("ModelFactory::model"))
    }
}

/// Results type produced by the models of factory `F`.
pub type ResultsOf<F> = <<F as ModelFactory>::Model as LinearModel>::Results;

/// Per-unit least squares estimates.
///
/// Columns index the flattened spatial units of the batch.
#[derive(Debug, Clone)]
pub struct RegressionResults {
    /// `p × m` coefficients.
    pub beta: DMatrix<f64>,
    /// `n × m` residuals (whitened for weighted fits).
    pub resid: DMatrix<f64>,
    /// Residual variance per unit (`SSE / df_resid`, NaN when `df_resid == 0`).
    pub sigma2: Vec<f64>,
    /// `pinv(X) pinv(X)ᵀ`, i.e. `(XᵀX)⁻¹` for full-rank designs.
    pub normalized_cov: DMatrix<f64>,
    pub df_resid: usize,
}

impl RegressionResults {
    pub fn n_params(&self) -> usize {
        self.beta.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.resid.nrows()
    }

    pub fn n_units(&self) -> usize {
        self.beta.ncols()
    }

    /// `cᵀβ` per unit.
    pub fn contrast_effect(&self, contrast: &[f64]) -> Result<Vec<f64>> {
        self.check_contrast(contrast)?;
        let effects = (0..self.n_units())
            .map(|j| {
                contrast
                    .iter()
                    .enumerate()
                    .map(|(i, c)| c * self.beta[(i, j)])
                    .sum::<f64>()
            })
            .collect();
        Ok(effects)
    }

    /// `cᵀ (XᵀX)⁻¹ c`, the unscaled variance of a contrast.
    pub fn contrast_variance(&self, contrast: &[f64]) -> Result<f64> {
        self.check_contrast(contrast)?;
        let p = self.n_params();
        let mut v = 0.0;
        for i in 0..p {
            for k in 0..p {
                v += contrast[i] * self.normalized_cov[(i, k)] * contrast[k];
            }
        }
        Ok(v)
    }

    /// t statistic of a contrast per unit.
    pub fn t(&self, contrast: &[f64]) -> Result<Vec<f64>> {
        let effects = self.contrast_effect(contrast)?;
        let v = self.contrast_variance(contrast)?;
        let t = effects
            .into_iter()
            .zip(&self.sigma2)
            .map(|(effect, s2)| effect / (s2 * v).sqrt())
            .collect();
        Ok(t)
    }

    fn check_contrast(&self, contrast: &[f64]) -> Result<()> {
        if contrast.len() != self.n_params() {
            return Err(Error::InvalidInput(format!(
                "contrast has {} weights but the design has {} columns",
                contrast.len(),
                self.n_params()
            )));
        }
        Ok(())
    }
}
