//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments into plain configs
//! - loads the data volume, design and weights
//! - sets up one output image per requested kind
//! - runs the fit iterator and saves the images
//! - prints summaries

use std::collections::HashSet;
use std::path::Path;

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, InspectArgs, SimulateArgs};
use crate::data::{DESIGN_COLUMNS, generate_volume};
use crate::domain::{FitParams, OutputKind, RunConfig, SimulateConfig};
use crate::error::{Error, Result};
use crate::fit::{LinearModelIterator, SlabSource};
use crate::grid::Grid;
use crate::image::VolumeImage;
use crate::io::{DesignFile, read_data_volume, read_design_json, read_weights_json, write_design_json};
use crate::models::{LinearModel, ModelFactory, OlsFactory, RegressionResults, WlsFactory};
use crate::output::{RegressionOutput, extractor_for};
use crate::report::{format_fit_summary, format_volume_summary};

/// Extension of every image written by `vfit`.
pub const IMAGE_EXT: &str = ".json";

/// Outputs written when `--output` is not given.
fn default_outputs() -> Vec<OutputKind> {
    vec![OutputKind::Coefficients, OutputKind::Variance]
}

/// Entry point for the `vfit` binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<()> {
    let config = run_config_from_args(&args);
    let report = run_fit(&config)?;
    println!("{report}");
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<()> {
    let config = simulate_config_from_args(&args);
    run_simulate(&config)?;
    println!(
        "Wrote {} ({} samples, volume {:?}) and {}",
        config.out_path.display(),
        config.n_samples,
        config.volume_shape,
        config.design_path.display()
    );
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let image = VolumeImage::open(&args.path)?;
    print!("{}", format_volume_summary(&image));
    Ok(())
}

pub fn run_config_from_args(args: &FitArgs) -> RunConfig {
    let outputs = if args.outputs.is_empty() {
        default_outputs()
    } else {
        args.outputs.clone()
    };
    RunConfig {
        data_path: args.data.clone(),
        design_path: args.design.clone(),
        weights_path: args.weights.clone(),
        out_dir: args.out_dir.clone(),
        outputs,
        overwrite: args.overwrite,
        slab_step: args.slab_step,
        streaming: args.streaming,
        params: FitParams { rcond: args.rcond },
    }
}

pub fn simulate_config_from_args(args: &SimulateArgs) -> SimulateConfig {
    SimulateConfig {
        out_path: args.out.clone(),
        design_path: args.design.clone(),
        volume_shape: args.shape.clone(),
        n_samples: args.samples,
        seed: args.seed,
        noise_sd: args.noise,
        overwrite: args.overwrite,
    }
}

/// Fit every voxel of `config.data_path` and write the requested images.
///
/// Returns the formatted run summary.
pub fn run_fit(config: &RunConfig) -> Result<String> {
    let data = read_data_volume(&config.data_path)?;
    let design = read_design_json(&config.design_path)?;
    let n_samples = data.shape()[0];
    if design.nrows() != n_samples {
        return Err(Error::DesignMismatch {
            design_rows: design.nrows(),
            samples: n_samples,
        });
    }
    log::info!(
        "data {:?}, design {}x{}",
        data.shape(),
        design.nrows(),
        design.ncols()
    );

    let source = SlabSource::volume(data, config.slab_step)?;
    let outputs = build_outputs(config, source.grid(), design.ncols(), n_samples)?;

    match &config.weights_path {
        Some(path) => {
            let weights = read_weights_json(path)?;
            run_iterator(config, source, WlsFactory::new(design, weights), outputs)
        }
        None => run_iterator(config, source, OlsFactory::new(design), outputs),
    }
}

/// One materialized sink per output kind, in request order.
pub fn build_outputs(
    config: &RunConfig,
    grid: &Grid,
    n_params: usize,
    n_samples: usize,
) -> Result<Vec<RegressionOutput<RegressionResults>>> {
    let mut seen = HashSet::new();
    let mut outputs = Vec::with_capacity(config.outputs.len());
    for kind in &config.outputs {
        check_kind(kind, n_params)?;
        let basename = kind.basename();
        if !seen.insert(basename.clone()) {
            return Err(Error::InvalidInput(format!("output '{kind}' requested twice")));
        }

        let nout = kind.nout(n_params, n_samples);
        let outgrid = if nout > 1 { Some(grid.stacked(nout)?) } else { None };
        let mut output = RegressionOutput::boxed(grid.clone(), nout, outgrid, extractor_for(kind))?;
        output.setup_destination(config.overwrite, &config.out_dir, IMAGE_EXT, &basename)?;
        outputs.push(output);
    }
    Ok(outputs)
}

fn check_kind(kind: &OutputKind, n_params: usize) -> Result<()> {
    match kind {
        OutputKind::Coefficient(i) if *i >= n_params => Err(Error::InvalidInput(format!(
            "output '{kind}' asks for coefficient {i} of a {n_params}-column design"
        ))),
        OutputKind::TContrast(c) | OutputKind::Effect(c) if c.len() != n_params => {
            Err(Error::InvalidInput(format!(
                "output '{kind}' has {} weights for a {n_params}-column design",
                c.len()
            )))
        }
        _ => Ok(()),
    }
}

fn run_iterator<F>(
    config: &RunConfig,
    source: SlabSource,
    factory: F,
    outputs: Vec<RegressionOutput<RegressionResults>>,
) -> Result<String>
where
    F: ModelFactory,
    F::Model: LinearModel<Results = RegressionResults>,
{
    let mut iterator = LinearModelIterator::new(source, factory, outputs);
    let summary = if config.streaming {
        iterator.fit_streaming(&config.params)?
    } else {
        iterator.fit(&config.params)?
    };

    let images = iterator
        .into_outputs()
        .into_iter()
        .map(|output| output.into_image().ok_or(Error::NotMaterialized))
        .collect::<Result<Vec<_>>>()?;
    for image in &images {
        image.save()?;
        log::info!("saved {}", image.path().unwrap_or(Path::new("<memory>")).display());
    }

    let refs: Vec<&VolumeImage> = images.iter().collect();
    Ok(format_fit_summary(config, &summary, &refs))
}

/// Write the synthetic volume, its design and the true coefficients
/// (`<out stem>.betas.json`).
pub fn run_simulate(config: &SimulateConfig) -> Result<()> {
    if !config.overwrite && config.design_path.exists() {
        return Err(Error::ImageExists(config.design_path.clone()));
    }
    let sample = generate_volume(config)?;

    let grid = Grid::new(sample.data.shape().to_vec())?;
    VolumeImage::from_array(sample.data, grid)?.save_as(&config.out_path, config.overwrite)?;

    let betas_path = config.out_path.with_extension("betas.json");
    let grid = Grid::new(sample.betas.shape().to_vec())?;
    VolumeImage::from_array(sample.betas, grid)?.save_as(&betas_path, config.overwrite)?;

    let columns = DESIGN_COLUMNS.iter().map(|c| c.to_string()).collect();
    write_design_json(&config.design_path, &DesignFile::from_matrix(&sample.design, columns))?;
    log::info!("simulated volume written to {}", config.out_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;
    use approx::assert_abs_diff_eq;

    fn simulate(dir: &Path, noise_sd: f64) -> SimulateConfig {
        let config = SimulateConfig {
            out_path: dir.join("bold.json"),
            design_path: dir.join("design.json"),
            volume_shape: vec![3, 2, 2],
            n_samples: 24,
            seed: 11,
            noise_sd,
            overwrite: false,
        };
        run_simulate(&config).unwrap();
        config
    }

    fn fit_config(dir: &Path, outputs: Vec<OutputKind>) -> RunConfig {
        RunConfig {
            data_path: dir.join("bold.json"),
            design_path: dir.join("design.json"),
            weights_path: None,
            out_dir: dir.join("out"),
            outputs,
            overwrite: false,
            slab_step: 1,
            streaming: false,
            params: FitParams::default(),
        }
    }

    #[test]
    fn simulate_then_fit_recovers_true_betas() {
        let dir = scratch_dir("app-recover");
        simulate(&dir, 0.0);
        let config = fit_config(&dir, vec![OutputKind::Coefficients, OutputKind::Variance]);
        let report = run_fit(&config).unwrap();
        assert!(report.contains("3 fitted"));

        let beta = VolumeImage::open(dir.join("out/beta.json")).unwrap();
        let truth = VolumeImage::open(dir.join("bold.betas.json")).unwrap();
        assert_eq!(beta.data().shape(), &[3, 3, 2, 2]);
        for (got, want) in beta.data().iter().zip(truth.data().iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-8);
        }

        let sigma2 = VolumeImage::open(dir.join("out/sigma2.json")).unwrap();
        assert_eq!(sigma2.data().shape(), &[3, 2, 2]);
        assert!(sigma2.data().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn existing_outputs_need_overwrite() {
        let dir = scratch_dir("app-overwrite");
        simulate(&dir, 1.0);
        let mut config = fit_config(&dir, vec![OutputKind::Variance]);
        run_fit(&config).unwrap();
        assert!(matches!(run_fit(&config), Err(Error::ImageExists(_))));

        config.overwrite = true;
        config.streaming = true;
        config.slab_step = 2;
        let report = run_fit(&config).unwrap();
        assert!(report.contains("2 fitted"));
    }

    #[test]
    fn rejects_duplicate_and_mis_sized_outputs() {
        let dir = scratch_dir("app-outputs");
        simulate(&dir, 1.0);

        let dup = fit_config(&dir, vec![OutputKind::Variance, OutputKind::Variance]);
        assert!(matches!(run_fit(&dup), Err(Error::InvalidInput(_))));

        let short = fit_config(&dir, vec![OutputKind::TContrast(vec![0.0, 1.0])]);
        assert!(matches!(run_fit(&short), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn design_rows_must_match_samples() {
        let dir = scratch_dir("app-mismatch");
        simulate(&dir, 1.0);
        let design = DesignFile {
            columns: vec![],
            rows: vec![vec![1.0]; 5],
        };
        write_design_json(&dir.join("short.json"), &design).unwrap();

        let mut config = fit_config(&dir, vec![OutputKind::Variance]);
        config.design_path = dir.join("short.json");
        assert!(matches!(
            run_fit(&config),
            Err(Error::DesignMismatch { design_rows: 5, samples: 24 })
        ));
    }

    #[test]
    fn weighted_fit_writes_t_maps() {
        let dir = scratch_dir("app-wls");
        simulate(&dir, 1.0);
        std::fs::write(dir.join("w.json"), serde_json::to_string(&vec![1.0; 24]).unwrap()).unwrap();

        let mut config = fit_config(&dir, vec![OutputKind::TContrast(vec![0.0, 0.0, 1.0])]);
        config.weights_path = Some(dir.join("w.json"));
        let report = run_fit(&config).unwrap();
        assert!(report.contains("WLS"));
        let t = VolumeImage::open(dir.join("out/t_0_0_1.json")).unwrap();
        assert_eq!(t.data().shape(), &[3, 2, 2]);
    }

    #[test]
    fn cli_defaults_request_beta_and_sigma2() {
        let cli = Cli::parse_from(["vfit", "fit", "--data", "d.json", "--design", "x.json"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = run_config_from_args(&args);
        assert_eq!(config.outputs, default_outputs());
        assert_eq!(config.params.rcond, 1e-12);
    }
}
