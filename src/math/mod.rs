//! Dense linear algebra shared by the regression models.

pub mod ols;

pub use ols::*;
