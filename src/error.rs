//! Crate-wide error type.
//!
//! Every failure carries a process exit code so the `vfit` binary can map
//! errors to a status without inspecting messages:
//!
//! - `1`: missing customization / misuse of the API (programming errors)
//! - `2`: I/O and input-file problems
//! - `3`: shape and grid bookkeeping disagreements
//! - `4`: model fitting failures

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is not implemented; a concrete implementation must provide it")]
    NotImplemented(&'static str),

    #[error("output image has not been set up yet (call `setup_destination` first)")]
    NotMaterialized,

    #[error("output image is already set up at '{}'", .0.display())]
    AlreadyMaterialized(PathBuf),

    #[error("output must produce at least one component per unit (nout = {0})")]
    InvalidNout(usize),

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },

    #[error("cannot reshape {found} elements into {shape:?} ({expected} elements)")]
    ElementCount {
        expected: usize,
        found: usize,
        shape: Vec<usize>,
    },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("grid iteration is exhausted ({0} units)")]
    GridExhausted(usize),

    #[error("image '{}' already exists (pass overwrite to replace it)", .0.display())]
    ImageExists(PathBuf),

    #[error("image '{}' is opened read-only", .0.display())]
    ReadOnly(PathBuf),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("design has {design_rows} rows but data has {samples} samples")]
    DesignMismatch { design_rows: usize, samples: usize },

    #[error("model fit failed: {0}")]
    Fit(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Error::NotImplemented(_) | Error::NotMaterialized | Error::AlreadyMaterialized(_) => 1,
            Error::Io { .. }
            | Error::Json { .. }
            | Error::ImageExists(_)
            | Error::ReadOnly(_)
            | Error::InvalidInput(_) => 2,
            Error::InvalidNout(_)
            | Error::ShapeMismatch { .. }
            | Error::ElementCount { .. }
            | Error::Shape(_)
            | Error::InvalidGrid(_)
            | Error::GridExhausted(_) => 3,
            Error::DesignMismatch { .. } | Error::Fit(_) => 4,
        }
    }
}
