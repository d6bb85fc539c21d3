//! `voxfit` library crate.
//!
//! Voxel-wise regression over image volumes: a data source is cut into
//! observation batches, a fresh linear model is fitted per batch and every
//! requested result is written into its own spatially addressed output image.
//!
//! The binary (`vfit`) is a thin wrapper around this library so the fitting
//! core stays testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod grid;
pub mod image;
pub mod io;
pub mod math;
pub mod models;
pub mod output;
pub mod report;

#[cfg(test)]
mod test_support;
