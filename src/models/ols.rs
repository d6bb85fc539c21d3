//! Ordinary and weighted least squares models.
//!
//! Both models share one design matrix across all units of a batch, so the
//! expensive part (the SVD pseudo-inverse) runs once per model and the per-unit
//! work is a matrix product plus a residual sum of squares per column.
//!
//! Weighted least squares scales rows by `sqrt(w_i)` and solves the resulting
//! ordinary problem. Residuals and variances are reported on that whitened
//! scale.

use nalgebra::DMatrix;
use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::domain::{FitParams, UnitContext};
use crate::error::{Error, Result};
use crate::math::pseudo_inverse;
use crate::models::model::{LinearModel, ModelFactory, RegressionResults};

#[derive(Debug, Clone)]
pub struct OlsModel {
    design: DMatrix<f64>,
    pinv: DMatrix<f64>,
    normalized_cov: DMatrix<f64>,
    rank: usize,
}

impl OlsModel {
    pub fn new(design: DMatrix<f64>, rcond: f64) -> Result<Self> {
        if design.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput("design matrix contains non-finite values".into()));
        }
        let (pinv, rank) = pseudo_inverse(&design, rcond)
            .ok_or_else(|| Error::Fit(format!("design of shape {:?} has no usable pseudo-inverse", design.shape())))?;
        let normalized_cov = &pinv * pinv.transpose();
        Ok(Self {
            design,
            pinv,
            normalized_cov,
            rank,
        })
    }

    pub fn design(&self) -> &DMatrix<f64> {
        &self.design
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn df_resid(&self) -> usize {
        self.design.nrows().saturating_sub(self.rank)
    }

    fn fit_matrix(&self, y: DMatrix<f64>) -> Result<RegressionResults> {
        if y.nrows() != self.design.nrows() {
            return Err(Error::DesignMismatch {
                design_rows: self.design.nrows(),
                samples: y.nrows(),
            });
        }

        let beta = &self.pinv * &y;
        let resid = y - &self.design * &beta;
        let df_resid = self.df_resid();

        // Units are independent columns; this is the only per-unit loop.
        let sigma2: Vec<f64> = (0..resid.ncols())
            .into_par_iter()
            .map(|j| {
                if df_resid == 0 {
                    f64::NAN
                } else {
                    resid.column(j).norm_squared() / df_resid as f64
                }
            })
            .collect();

        Ok(RegressionResults {
            beta,
            resid,
            sigma2,
            normalized_cov: self.normalized_cov.clone(),
            df_resid,
        })
    }
}

impl LinearModel for OlsModel {
    type Results = RegressionResults;

    fn fit(&self, data: ArrayView2<'_, f64>, _params: &FitParams) -> Result<RegressionResults> {
        self.fit_matrix(to_dmatrix(data))
    }
}

#[derive(Debug, Clone)]
pub struct WlsModel {
    whitened: OlsModel,
    sqrt_w: Vec<f64>,
}

impl WlsModel {
    pub fn new(design: DMatrix<f64>, weights: &[f64], rcond: f64) -> Result<Self> {
        if weights.len() != design.nrows() {
            return Err(Error::DesignMismatch {
                design_rows: design.nrows(),
                samples: weights.len(),
            });
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidInput("weights must be finite and non-negative".into()));
        }
        let sqrt_w: Vec<f64> = weights.iter().map(|w| w.sqrt()).collect();
        let whitened = OlsModel::new(scale_rows(design, &sqrt_w), rcond)?;
        Ok(Self { whitened, sqrt_w })
    }

    pub fn rank(&self) -> usize {
        self.whitened.rank()
    }
}

impl LinearModel for WlsModel {
    type Results = RegressionResults;

    fn fit(&self, data: ArrayView2<'_, f64>, _params: &FitParams) -> Result<RegressionResults> {
        if data.nrows() != self.sqrt_w.len() {
            return Err(Error::DesignMismatch {
                design_rows: self.sqrt_w.len(),
                samples: data.nrows(),
            });
        }
        self.whitened.fit_matrix(scale_rows(to_dmatrix(data), &self.sqrt_w))
    }
}

/// Builds an [`OlsModel`] over a fixed design for every unit.
#[derive(Debug, Clone)]
pub struct OlsFactory {
    design: DMatrix<f64>,
}

impl OlsFactory {
    pub fn new(design: DMatrix<f64>) -> Self {
        Self { design }
    }
}

impl ModelFactory for OlsFactory {
    type Model = OlsModel;

    fn model(&mut self, unit: &UnitContext, params: &FitParams) -> Result<OlsModel> {
        check_samples(&self.design, unit)?;
        OlsModel::new(self.design.clone(), params.rcond)
    }
}

/// Builds a [`WlsModel`] over a fixed design and weights for every unit.
#[derive(Debug, Clone)]
pub struct WlsFactory {
    design: DMatrix<f64>,
    weights: Vec<f64>,
}

impl WlsFactory {
    pub fn new(design: DMatrix<f64>, weights: Vec<f64>) -> Self {
        Self { design, weights }
    }
}

impl ModelFactory for WlsFactory {
    type Model = WlsModel;

    fn model(&mut self, unit: &UnitContext, params: &FitParams) -> Result<WlsModel> {
        check_samples(&self.design, unit)?;
        WlsModel::new(self.design.clone(), &self.weights, params.rcond)
    }
}

fn check_samples(design: &DMatrix<f64>, unit: &UnitContext) -> Result<()> {
    if design.nrows() != unit.n_samples {
        return Err(Error::DesignMismatch {
            design_rows: design.nrows(),
            samples: unit.n_samples,
        });
    }
    Ok(())
}

fn to_dmatrix(data: ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(data.nrows(), data.ncols(), |i, j| data[[i, j]])
}

fn scale_rows(mut m: DMatrix<f64>, scale: &[f64]) -> DMatrix<f64> {
    for (i, s) in scale.iter().enumerate() {
        m.row_mut(i).scale_mut(*s);
    }
    m
}
