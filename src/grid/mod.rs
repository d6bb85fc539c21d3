//! Spatial grids and their slab iteration order.
//!
//! A grid is the addressing scheme shared by a data source and the images that
//! receive fitted results: the volume shape plus a cursor that walks one axis
//! in fixed-size slabs.

pub mod grid;

pub use grid::*;
