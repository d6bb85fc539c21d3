//! Regression outputs.
//!
//! - result extraction capability + concrete extractors (`extract`)
//! - the sink that owns and writes one output image (`sink`)

pub mod extract;
pub mod sink;

pub use extract::*;
pub use sink::*;
