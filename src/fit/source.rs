//! Observation batches cut from a full data volume.
//!
//! The volume is laid out as `(n_samples, *volume_shape)`. A grid over
//! `volume_shape` decides how it is cut: every unit of the grid walk becomes one
//! `(n_samples, *block_shape)` batch.

use ndarray::{ArrayD, Axis, Slice};

use crate::error::{Error, Result};
use crate::grid::Grid;

#[derive(Debug, Clone)]
pub struct SlabSource {
    data: ArrayD<f64>,
    grid: Grid,
}

impl SlabSource {
    pub fn new(data: ArrayD<f64>, mut grid: Grid) -> Result<Self> {
        if data.ndim() < 2 || data.shape()[1..] != *grid.shape() {
            return Err(Error::ShapeMismatch {
                expected: std::iter::once(data.shape().first().copied().unwrap_or(0))
                    .chain(grid.shape().iter().copied())
                    .collect(),
                found: data.shape().to_vec(),
            });
        }
        grid.rewind();
        Ok(Self { data, grid })
    }

    /// Cut `data` along its first volume axis, `slab_step` planes per batch.
    pub fn volume(data: ArrayD<f64>, slab_step: usize) -> Result<Self> {
        if data.ndim() < 2 {
            return Err(Error::InvalidInput(format!(
                "data of shape {:?} has no volume axes",
                data.shape()
            )));
        }
        let grid = Grid::new(data.shape()[1..].to_vec())?.with_slab(0, slab_step)?;
        Self::new(data, grid)
    }

    /// Grid over the volume axes, positioned at the next batch.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn n_samples(&self) -> usize {
        self.data.shape()[0]
    }
}

impl Iterator for SlabSource {
    type Item = ArrayD<f64>;

    fn next(&mut self) -> Option<ArrayD<f64>> {
        let range = self.grid.block_range()?;
        // Sample axis comes first.
        let axis = Axis(self.grid.slab_axis() + 1);
        let view = self.data.slice_axis(axis, Slice::from(range));
        let batch = if self.grid.slab_step() == 1 {
            view.index_axis_move(axis, 0).to_owned()
        } else {
            view.to_owned()
        };
        self.grid.advance();
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.grid.units() - self.grid.position();
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn volume() -> ArrayD<f64> {
        ArrayD::from_shape_fn(IxDyn(&[4, 3, 2]), |ix| (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64)
    }

    #[test]
    fn plane_batches_drop_the_walked_axis() {
        let batches: Vec<_> = SlabSource::volume(volume(), 1).unwrap().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].shape(), &[4, 2]);
        assert_eq!(batches[2][[3, 1]], 321.0);
    }

    #[test]
    fn slab_batches_keep_the_walked_axis() {
        let source = SlabSource::volume(volume(), 2).unwrap();
        assert_eq!(source.size_hint(), (2, Some(2)));
        let batches: Vec<_> = source.collect();
        assert_eq!(batches[0].shape(), &[4, 2, 2]);
        assert_eq!(batches[1].shape(), &[4, 1, 2]);
        assert_eq!(batches[1][[1, 0, 0]], 120.0);
    }

    #[test]
    fn grid_must_cover_the_volume_axes() {
        let grid = Grid::new(vec![3, 3]).unwrap();
        assert!(SlabSource::new(volume(), grid).is_err());
        let flat = ArrayD::zeros(IxDyn(&[5]));
        assert!(SlabSource::volume(flat, 1).is_err());
    }
}
