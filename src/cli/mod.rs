//! Command-line parsing for the voxel-wise regression tool.
//!
//! Argument parsing and command dispatch stay separate from the fitting code:
//! `app` maps these structs into plain configuration types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::OutputKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "vfit", version, about = "Voxel-wise linear regression over image volumes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a linear model at every voxel and write one image per output.
    Fit(FitArgs),
    /// Write a seeded synthetic volume and its design matrix.
    Simulate(SimulateArgs),
    /// Print shape and summary statistics of a volume file.
    Inspect(InspectArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Observation volume `(samples, *volume)` as written by `vfit simulate`.
    #[arg(long, value_name = "JSON")]
    pub data: PathBuf,

    /// Design matrix JSON (`{"columns": [...], "rows": [[...], ...]}`).
    #[arg(long, value_name = "JSON")]
    pub design: PathBuf,

    /// Per-sample weights (JSON array); fits WLS instead of OLS.
    #[arg(long, value_name = "JSON")]
    pub weights: Option<PathBuf>,

    /// Directory receiving the output images.
    #[arg(short = 'o', long, default_value = "vfit-out")]
    pub out_dir: PathBuf,

    /// Output to write: beta, beta:<i>, t:<c,..>, effect:<c,..>, resid or sigma2.
    /// Repeat for several outputs (default: beta and sigma2).
    #[arg(long = "output", value_name = "KIND")]
    pub outputs: Vec<OutputKind>,

    /// Replace existing output files.
    #[arg(long)]
    pub overwrite: bool,

    /// Planes of the first volume axis per fitted batch.
    #[arg(long, default_value_t = 1)]
    pub slab_step: usize,

    /// Fit batch by batch instead of loading every batch first.
    #[arg(long)]
    pub streaming: bool,

    /// Relative singular value cutoff for the design pseudo-inverse.
    #[arg(long, default_value_t = 1e-12)]
    pub rcond: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Volume file to write.
    #[arg(long, value_name = "JSON")]
    pub out: PathBuf,

    /// Design file to write alongside the volume.
    #[arg(long, value_name = "JSON")]
    pub design: PathBuf,

    /// Volume shape, comma separated (e.g. `4,8,8`).
    #[arg(long, value_delimiter = ',', default_values_t = [4usize, 8, 8])]
    pub shape: Vec<usize>,

    /// Number of samples (time points).
    #[arg(short = 'n', long, default_value_t = 40)]
    pub samples: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Standard deviation of the Gaussian noise.
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    /// Replace existing files.
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct InspectArgs {
    /// Volume file to summarize.
    #[arg(value_name = "JSON")]
    pub path: PathBuf,
}
