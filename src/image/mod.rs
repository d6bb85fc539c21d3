//! Image containers that receive (and serve) spatial blocks.
//!
//! - `VolumeImage`: dense in-memory volume with a slab cursor and JSON persistence

pub mod volume;

pub use volume::*;
