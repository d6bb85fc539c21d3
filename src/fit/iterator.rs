//! The fit-and-dispatch loop.
//!
//! For every observation batch `(n_samples, *spatial_shape)`:
//!
//! 1. flatten the spatial axes into `(n_samples, n_units)`
//! 2. ask the factory for a fresh model and fit it
//! 3. for each output, in registration order: extract, reshape to
//!    `spatial_shape` (or `(nout,) + spatial_shape`), enter iteration on its
//!    image and write the block
//!
//! Nothing is retried. The first error aborts the run and leaves earlier
//! writes in place.

use ndarray::{Array1, ArrayD, ArrayViewD, IxDyn};

use crate::domain::{FitParams, UnitContext};
use crate::error::{Error, Result};
use crate::models::{LinearModel, ModelFactory, ResultsOf};
use crate::output::RegressionOutput;

/// Counters for one `fit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitSummary {
    /// Batches fitted.
    pub units: usize,
    /// Blocks written across all outputs.
    pub writes: usize,
}

pub struct LinearModelIterator<S, F>
where
    F: ModelFactory,
{
    source: S,
    factory: F,
    outputs: Vec<RegressionOutput<ResultsOf<F>>>,
}

impl<S, F> LinearModelIterator<S, F>
where
    S: Iterator<Item = ArrayD<f64>>,
    F: ModelFactory,
{
    /// Wrap a single-pass data source. Pass `Vec::new()` for no outputs.
    pub fn new<I>(source: I, factory: F, outputs: Vec<RegressionOutput<ResultsOf<F>>>) -> Self
    where
        I: IntoIterator<IntoIter = S>,
    {
        Self {
            source: source.into_iter(),
            factory,
            outputs,
        }
    }

    pub fn with_output(mut self, output: RegressionOutput<ResultsOf<F>>) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn outputs(&self) -> &[RegressionOutput<ResultsOf<F>>] {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut [RegressionOutput<ResultsOf<F>>] {
        &mut self.outputs
    }

    pub fn into_outputs(self) -> Vec<RegressionOutput<ResultsOf<F>>> {
        self.outputs
    }

    /// Drain the source into memory, then fit and dispatch every batch.
    ///
    /// The source is single-pass: a second call sees no batches.
    pub fn fit(&mut self, params: &FitParams) -> Result<FitSummary> {
        let batches: Vec<ArrayD<f64>> = self.source.by_ref().collect();
        log::info!(
            "fitting {} batches into {} outputs",
            batches.len(),
            self.outputs.len()
        );

        let mut summary = FitSummary::default();
        for (index, data) in batches.iter().enumerate() {
            summary.writes += self.fit_unit(index, data.view(), params)?;
            summary.units += 1;
        }
        Ok(summary)
    }

    /// Like [`fit`](Self::fit), but pulls one batch at a time from the source.
    pub fn fit_streaming(&mut self, params: &FitParams) -> Result<FitSummary> {
        let mut summary = FitSummary::default();
        while let Some(data) = self.source.next() {
            summary.writes += self.fit_unit(summary.units, data.view(), params)?;
            summary.units += 1;
        }
        log::info!("streamed {} batches into {} outputs", summary.units, self.outputs.len());
        Ok(summary)
    }

    fn fit_unit(&mut self, index: usize, data: ArrayViewD<'_, f64>, params: &FitParams) -> Result<usize> {
        let Some((&n_samples, spatial_shape)) = data.shape().split_first() else {
            return Err(Error::InvalidInput(
                "observation batch needs a leading sample axis".into(),
            ));
        };
        let unit = UnitContext {
            index,
            n_samples,
            spatial_shape: spatial_shape.to_vec(),
        };

        let flat = data.to_shape((n_samples, unit.n_units()))?;
        let model = self.factory.model(&unit, params)?;
        let results = model.fit(flat.view(), params)?;

        for output in &mut self.outputs {
            let out = output.extract(&results)?;
            let out = reshape_output(out, output.nout(), &unit.spatial_shape)?;
            output.begin()?.set_next(out.view())?;
        }
        log::debug!(
            "unit {index}: {n_samples} samples, spatial {:?}",
            unit.spatial_shape
        );
        Ok(self.outputs.len())
    }
}

/// Reshape an extracted flat array to `spatial_shape`, with a leading
/// component axis when `nout > 1`.
pub fn reshape_output(out: Array1<f64>, nout: usize, spatial_shape: &[usize]) -> Result<ArrayD<f64>> {
    let mut shape = Vec::with_capacity(spatial_shape.len() + 1);
    if nout > 1 {
        shape.push(nout);
    }
    shape.extend_from_slice(spatial_shape);

    let expected: usize = shape.iter().product();
    if out.len() != expected {
        return Err(Error::ElementCount {
            expected,
            found: out.len(),
            shape,
        });
    }
    Ok(out.into_shape_with_order(IxDyn(&shape))?)
}
