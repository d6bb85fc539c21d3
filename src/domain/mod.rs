//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - per-fit keyword parameters (`FitParams`) and iteration context (`UnitContext`)
//! - output kinds selectable from the CLI (`OutputKind`)
//! - run configurations derived from CLI flags (`RunConfig`, `SimulateConfig`)

pub mod types;

pub use types::*;
