//! Synthetic data for demos and end-to-end checks.

pub mod sample;

pub use sample::*;
