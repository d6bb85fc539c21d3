//! Statistical models fitted per iteration unit.
//!
//! - capability traits and results (`model`)
//! - ordinary / weighted least squares and their factories (`ols`)

pub mod model;
pub mod ols;

pub use model::*;
pub use ols::*;
