//! Grid shape + slab cursor.
//!
//! The walk is defined by `(axis, step)`: each iteration unit covers `step`
//! consecutive planes along `axis` (the final unit may be shorter). With
//! `step == 1` the walked axis is squeezed out of the block shape, so a
//! `(z, y, x)` volume yields `(y, x)` slices.
//!
//! Grids of different rank are aligned on their trailing dimensions when the
//! iterator is copied. This lets an output image with leading component axes
//! (`(nout, z, y, x)`) follow the same walk as the `(z, y, x)` input grid.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    shape: Vec<usize>,
    axis: usize,
    step: usize,
    #[serde(skip)]
    position: usize,
}

impl Grid {
    /// Grid over `shape`, walking axis 0 one plane at a time.
    pub fn new(shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        if shape.is_empty() {
            return Err(Error::InvalidGrid("grid shape must have at least one axis".into()));
        }
        if shape.contains(&0) {
            return Err(Error::InvalidGrid(format!("grid shape {shape:?} has an empty axis")));
        }
        Ok(Self {
            shape,
            axis: 0,
            step: 1,
            position: 0,
        })
    }

    /// Walk `axis` in blocks of `step` planes.
    pub fn with_slab(mut self, axis: usize, step: usize) -> Result<Self> {
        let Some(&extent) = self.shape.get(axis) else {
            return Err(Error::InvalidGrid(format!(
                "slab axis {axis} out of range for shape {:?}",
                self.shape
            )));
        };
        if step == 0 || step > extent {
            return Err(Error::InvalidGrid(format!(
                "slab step must be in 1..={extent}, got {step}"
            )));
        }
        self.axis = axis;
        self.step = step;
        self.position = 0;
        Ok(self)
    }

    /// Same walk over `(nout,) + shape`.
    pub fn stacked(&self, nout: usize) -> Result<Self> {
        if nout == 0 {
            return Err(Error::InvalidNout(nout));
        }
        let mut shape = Vec::with_capacity(self.shape.len() + 1);
        shape.push(nout);
        shape.extend_from_slice(&self.shape);
        let mut out = Grid::new(shape)?;
        out.copy_iter(self)?;
        Ok(out)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements addressed by the grid.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slab_axis(&self) -> usize {
        self.axis
    }

    pub fn slab_step(&self) -> usize {
        self.step
    }

    /// Number of iteration units in one full pass.
    pub fn units(&self) -> usize {
        self.shape[self.axis].div_ceil(self.step)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.units()
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn advance(&mut self) {
        self.position = (self.position + 1).min(self.units());
    }

    /// Plane range along the slab axis covered by the current unit.
    pub fn block_range(&self) -> Option<Range<usize>> {
        if self.is_exhausted() {
            return None;
        }
        let start = self.position * self.step;
        let end = (start + self.step).min(self.shape[self.axis]);
        Some(start..end)
    }

    /// Shape of the block at the cursor.
    pub fn block_shape(&self) -> Option<Vec<usize>> {
        let range = self.block_range()?;
        let mut shape = self.shape.clone();
        if self.step == 1 {
            shape.remove(self.axis);
        } else {
            shape[self.axis] = range.len();
        }
        Some(shape)
    }

    /// Copy the slab walk of `other` onto this grid and rewind.
    ///
    /// `other` must match this grid's trailing dimensions exactly.
    pub fn copy_iter(&mut self, other: &Grid) -> Result<()> {
        if self.ndim() < other.ndim() {
            return Err(Error::InvalidGrid(format!(
                "cannot follow a {}-d grid with a {}-d grid",
                other.ndim(),
                self.ndim()
            )));
        }
        let lead = self.ndim() - other.ndim();
        if self.shape[lead..] != other.shape[..] {
            return Err(Error::InvalidGrid(format!(
                "grid {:?} does not end with {:?}",
                self.shape, other.shape
            )));
        }
        self.axis = other.axis + lead;
        self.step = other.step;
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_shapes() {
        assert!(Grid::new(Vec::<usize>::new()).is_err());
        assert!(Grid::new(vec![4, 0, 2]).is_err());
    }

    #[test]
    fn default_walk_squeezes_axis_zero() {
        let mut grid = Grid::new(vec![3, 4, 5]).unwrap();
        assert_eq!(grid.units(), 3);
        assert_eq!(grid.block_shape(), Some(vec![4, 5]));
        grid.advance();
        grid.advance();
        assert_eq!(grid.block_range(), Some(2..3));
        grid.advance();
        assert!(grid.is_exhausted());
        assert_eq!(grid.block_shape(), None);
        grid.rewind();
        assert_eq!(grid.position(), 0);
    }

    #[test]
    fn slabs_keep_axis_and_shorten_last_block() {
        let mut grid = Grid::new(vec![10, 2]).unwrap().with_slab(0, 4).unwrap();
        assert_eq!(grid.units(), 3);
        assert_eq!(grid.block_shape(), Some(vec![4, 2]));
        grid.advance();
        grid.advance();
        assert_eq!(grid.block_range(), Some(8..10));
        assert_eq!(grid.block_shape(), Some(vec![2, 2]));
    }

    #[test]
    fn copy_iter_aligns_trailing_axes() {
        let input = Grid::new(vec![6, 4, 4]).unwrap().with_slab(1, 2).unwrap();
        let mut out = Grid::new(vec![3, 6, 4, 4]).unwrap();
        out.advance();
        out.copy_iter(&input).unwrap();
        assert_eq!(out.slab_axis(), 2);
        assert_eq!(out.slab_step(), 2);
        assert_eq!(out.position(), 0);
        assert_eq!(out.block_shape(), Some(vec![3, 6, 2, 4]));
    }

    #[test]
    fn copy_iter_rejects_incompatible_grids() {
        let input = Grid::new(vec![6, 4, 4]).unwrap();
        assert!(Grid::new(vec![6, 4, 5]).unwrap().copy_iter(&input).is_err());
        assert!(Grid::new(vec![4, 4]).unwrap().copy_iter(&input).is_err());
    }

    #[test]
    fn stacked_grid_follows_the_same_walk() {
        let input = Grid::new(vec![2, 4, 4]).unwrap();
        let out = input.stacked(3).unwrap();
        assert_eq!(out.shape(), &[3, 2, 4, 4]);
        assert_eq!(out.units(), 2);
        assert_eq!(out.block_shape(), Some(vec![3, 4, 4]));
        assert!(input.stacked(0).is_err());
    }
}
