//! Input/output helpers.
//!
//! - design matrix, weights and data volume readers (`design`)
//!
//! Output images are written by `image::VolumeImage` itself.

pub mod design;

pub use design::*;
