//! Result extractors: which numbers of a fit end up in an output image.
//!
//! An extractor turns a results object into a flat array laid out as
//! `(nout, n_units)` in row-major order (or just `n_units` when `nout == 1`).
//! The iterator reshapes that array back onto the batch's spatial shape.

use nalgebra::DMatrix;
use ndarray::Array1;

use crate::domain::OutputKind;
use crate::error::{Error, Result};
use crate::models::RegressionResults;

/// Pulls one derived quantity out of a results object.
///
/// The provided method fails with [`Error::NotImplemented`]; concrete
/// extractors override it.
pub trait ResultExtractor<R> {
    fn extract(&self, results: &R) -> Result<Array1<f64>> {
        let _ = results;
        Err(Error::NotImplemented("ResultExtractor::extract"))
    }
}

/// Adapter for ad-hoc extraction closures.
pub struct ExtractWith<F>(pub F);

impl<R, F> ResultExtractor<R> for ExtractWith<F>
where
    F: Fn(&R) -> Result<Array1<f64>>,
{
    fn extract(&self, results: &R) -> Result<Array1<f64>> {
        (self.0)(results)
    }
}

/// All coefficients (`nout = p`) or a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coefficients {
    pub index: Option<usize>,
}

impl ResultExtractor<RegressionResults> for Coefficients {
    fn extract(&self, results: &RegressionResults) -> Result<Array1<f64>> {
        match self.index {
            None => Ok(flatten_rows(&results.beta)),
            Some(i) if i < results.n_params() => {
                Ok(results.beta.row(i).iter().copied().collect())
            }
            Some(i) => Err(Error::InvalidInput(format!(
                "coefficient {i} out of range for a design with {} columns",
                results.n_params()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TContrast(pub Vec<f64>);

impl ResultExtractor<RegressionResults> for TContrast {
    fn extract(&self, results: &RegressionResults) -> Result<Array1<f64>> {
        results.t(&self.0).map(Array1::from)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContrastEffect(pub Vec<f64>);

impl ResultExtractor<RegressionResults> for ContrastEffect {
    fn extract(&self, results: &RegressionResults) -> Result<Array1<f64>> {
        results.contrast_effect(&self.0).map(Array1::from)
    }
}

/// Residuals, one component per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Residuals;

impl ResultExtractor<RegressionResults> for Residuals {
    fn extract(&self, results: &RegressionResults) -> Result<Array1<f64>> {
        Ok(flatten_rows(&results.resid))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variance;

impl ResultExtractor<RegressionResults> for Variance {
    fn extract(&self, results: &RegressionResults) -> Result<Array1<f64>> {
        Ok(Array1::from(results.sigma2.clone()))
    }
}

/// Extractor for a CLI-selected output kind.
pub fn extractor_for(kind: &OutputKind) -> Box<dyn ResultExtractor<RegressionResults>> {
    match kind {
        OutputKind::Coefficients => Box::new(Coefficients { index: None }),
        OutputKind::Coefficient(i) => Box::new(Coefficients { index: Some(*i) }),
        OutputKind::TContrast(c) => Box::new(TContrast(c.clone())),
        OutputKind::Effect(c) => Box::new(ContrastEffect(c.clone())),
        OutputKind::Residuals => Box::new(Residuals),
        OutputKind::Variance => Box::new(Variance),
    }
}

fn flatten_rows(m: &DMatrix<f64>) -> Array1<f64> {
    let cols = m.ncols();
    Array1::from_shape_fn(m.nrows() * cols, |k| m[(k / cols, k % cols)])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unspecified;

    impl ResultExtractor<RegressionResults> for Unspecified {}

    fn results() -> RegressionResults {
        RegressionResults {
            beta: DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            resid: DMatrix::from_row_slice(2, 3, &[0.1, 0.2, 0.3, -0.1, -0.2, -0.3]),
            sigma2: vec![1.0, 2.0, 3.0],
            normalized_cov: DMatrix::identity(2, 2),
            df_resid: 1,
        }
    }

    #[test]
    fn unspecified_extract_is_not_implemented() {
        let err = Unspecified.extract(&results()).unwrap_err();
        assert!(matches!(err, Error::NotImplemented("ResultExtractor::extract")));
    }

    #[test]
    fn coefficients_are_component_major() {
        let all = Coefficients { index: None }.extract(&results()).unwrap();
        assert_eq!(all.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let second = Coefficients { index: Some(1) }.extract(&results()).unwrap();
        assert_eq!(second.to_vec(), vec![4.0, 5.0, 6.0]);
        assert!(Coefficients { index: Some(2) }.extract(&results()).is_err());
    }

    #[test]
    fn residuals_and_variance_cover_every_unit() {
        assert_eq!(Residuals.extract(&results()).unwrap().len(), 6);
        assert_eq!(Variance.extract(&results()).unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn cli_kinds_map_to_extractors() {
        let e = extractor_for(&OutputKind::Effect(vec![1.0, -1.0]));
        assert_eq!(e.extract(&results()).unwrap().to_vec(), vec![-3.0, -3.0, -3.0]);
        let t = extractor_for(&OutputKind::TContrast(vec![0.0, 1.0]));
        assert_eq!(t.extract(&results()).unwrap()[0], 4.0);
    }

    #[test]
    fn closures_can_extract() {
        let first_beta = ExtractWith(|r: &RegressionResults| -> Result<Array1<f64>> {
            Ok(Array1::from_elem(1, r.beta[(0, 0)]))
        });
        assert_eq!(first_beta.extract(&results()).unwrap()[0], 1.0);
    }
}
