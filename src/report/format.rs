//! Formatted terminal output for `vfit`.
//!
//! Formatting lives here so the fitting code never prints.

use crate::domain::RunConfig;
use crate::fit::FitSummary;
use crate::image::VolumeImage;
use crate::report::volume_stats;

/// Shape, slab walk and value statistics of one image.
pub fn format_volume_summary(image: &VolumeImage) -> String {
    let mut out = String::new();
    let grid = image.grid();
    let stats = volume_stats(image.data());

    if let Some(path) = image.path() {
        out.push_str(&format!("Image: {}\n", path.display()));
    }
    out.push_str(&format!("Shape: {:?} ({} values)\n", grid.shape(), stats.n_values));
    out.push_str(&format!(
        "Slab: axis={} step={} units={}\n",
        grid.slab_axis(),
        grid.slab_step(),
        grid.units()
    ));
    out.push_str(&format!(
        "Values: min={:.4} max={:.4} mean={:.4} non-finite={}\n",
        stats.min, stats.max, stats.mean, stats.n_nonfinite
    ));
    out
}

/// Run header plus one line per written output.
pub fn format_fit_summary(config: &RunConfig, summary: &FitSummary, images: &[&VolumeImage]) -> String {
    let mut out = String::new();

    out.push_str("=== vfit - voxel-wise regression ===\n");
    out.push_str(&format!("Data: {}\n", config.data_path.display()));
    out.push_str(&format!("Design: {}\n", config.design_path.display()));
    match &config.weights_path {
        Some(w) => out.push_str(&format!("Model: WLS (weights {})\n", w.display())),
        None => out.push_str("Model: OLS\n"),
    }
    out.push_str(&format!(
        "Units: {} fitted | {} blocks written | slab step {}{}\n",
        summary.units,
        summary.writes,
        config.slab_step,
        if config.streaming { " (streaming)" } else { "" }
    ));

    out.push_str("\nOutputs:\n");
    for (kind, image) in config.outputs.iter().zip(images) {
        let stats = volume_stats(image.data());
        let path = image
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        out.push_str(&format!(
            "- {:<14} {:<40} shape={:?} mean={:.4}\n",
            kind.to_string(),
            path,
            image.grid().shape(),
            stats.mean
        ));
    }
    out
}
