//! Design matrix and weights files.
//!
//! A design file is row-major JSON with optional column names:
//!
//! ```text
//! { "columns": ["intercept", "task"], "rows": [[1.0, 0.0], [1.0, 1.0], ...] }
//! ```
//!
//! A weights file is a plain JSON array with one non-negative value per sample.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::DMatrix;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::VolumeImage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignFile {
    #[serde(default)]
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl DesignFile {
    pub fn from_matrix(design: &DMatrix<f64>, columns: Vec<String>) -> Self {
        let rows = design
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        Self { columns, rows }
    }

    /// Validate and convert to an `n × p` matrix.
    pub fn to_matrix(&self) -> Result<DMatrix<f64>> {
        let n = self.rows.len();
        let p = self.rows.first().map(Vec::len).unwrap_or(0);
        if n == 0 || p == 0 {
            return Err(Error::InvalidInput("design has no rows or no columns".into()));
        }
        if let Some((i, row)) = self.rows.iter().enumerate().find(|(_, r)| r.len() != p) {
            return Err(Error::InvalidInput(format!(
                "design row {i} has {} values, expected {p}",
                row.len()
            )));
        }
        if !self.columns.is_empty() && self.columns.len() != p {
            return Err(Error::InvalidInput(format!(
                "design names {} columns but rows have {p}",
                self.columns.len()
            )));
        }
        if self.rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput("design contains non-finite values".into()));
        }
        Ok(DMatrix::from_fn(n, p, |i, j| self.rows[i][j]))
    }
}

pub fn read_design_json(path: &Path) -> Result<DMatrix<f64>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let design: DesignFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))?;
    design.to_matrix()
}

pub fn write_design_json(path: &Path, design: &DesignFile) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, design).map_err(|e| Error::json(path, e))?;
    writer.flush().map_err(|e| Error::io(path, e))
}

pub fn read_weights_json(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let weights: Vec<f64> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))?;
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(Error::InvalidInput(format!(
            "weights in '{}' must be finite and non-negative",
            path.display()
        )));
    }
    Ok(weights)
}

/// Observation volume `(n_samples, *volume_shape)` stored as an image file.
pub fn read_data_volume(path: &Path) -> Result<ArrayD<f64>> {
    let data = VolumeImage::open(path)?.into_array();
    if data.ndim() < 2 {
        return Err(Error::InvalidInput(format!(
            "data volume '{}' has shape {:?}; expected (samples, *volume)",
            path.display(),
            data.shape()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    #[test]
    fn design_round_trips_through_json() {
        let dir = scratch_dir("design-json");
        let path = dir.join("design.json");
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        write_design_json(&path, &DesignFile::from_matrix(&m, vec!["c".into(), "x".into()])).unwrap();
        assert_eq!(read_design_json(&path).unwrap(), m);
    }

    #[test]
    fn ragged_or_mislabelled_designs_are_rejected() {
        let ragged = DesignFile {
            columns: vec![],
            rows: vec![vec![1.0, 2.0], vec![1.0]],
        };
        assert!(ragged.to_matrix().is_err());

        let mislabelled = DesignFile {
            columns: vec!["only".into()],
            rows: vec![vec![1.0, 2.0]],
        };
        assert!(mislabelled.to_matrix().is_err());

        let empty = DesignFile {
            columns: vec![],
            rows: vec![],
        };
        assert!(empty.to_matrix().is_err());
    }

    #[test]
    fn negative_weights_are_rejected() {
        let dir = scratch_dir("weights-json");
        let path = dir.join("w.json");
        std::fs::write(&path, "[1.0, -0.5]").unwrap();
        assert!(matches!(read_weights_json(&path), Err(Error::InvalidInput(_))));
        std::fs::write(&path, "[1.0, 0.5]").unwrap();
        assert_eq!(read_weights_json(&path).unwrap(), vec![1.0, 0.5]);
    }
}
