//! Model fitting orchestration.
//!
//! Responsibilities:
//!
//! - cut a data volume into observation batches (`source`)
//! - fit a fresh model per batch and route results into outputs (`iterator`)

pub mod iterator;
pub mod source;

pub use iterator::*;
pub use source::*;
