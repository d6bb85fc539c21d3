//! Dense volume image with a slab cursor.
//!
//! The image keeps its whole volume in memory and moves blocks in and out at
//! the position of its grid cursor. On disk a volume is a small JSON document:
//!
//! ```text
//! { "grid": { "shape": [...], "axis": 0, "step": 1 }, "data": [...] }
//! ```
//!
//! with `data` in row-major order over `grid.shape`.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct VolumeImage {
    path: Option<PathBuf>,
    mode: OpenMode,
    grid: Grid,
    data: ArrayD<f64>,
    /// Set by `begin`, cleared by `rewind`.
    pass_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredVolume {
    grid: Grid,
    data: Vec<f64>,
}

impl VolumeImage {
    /// Create a zero-filled image at `path` in write mode.
    ///
    /// The file is written immediately so a second `create` without
    /// `overwrite` fails with [`Error::ImageExists`].
    pub fn create(path: impl AsRef<Path>, grid: Grid, overwrite: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = open_for_write(path, overwrite)?;

        let data = ArrayD::zeros(IxDyn(grid.shape()));
        let image = Self {
            path: Some(path.to_path_buf()),
            mode: OpenMode::Write,
            grid,
            data,
            pass_active: false,
        };
        image.write_to(file, path)?;
        log::debug!("created image {} with shape {:?}", path.display(), image.grid.shape());
        Ok(image)
    }

    /// Open an existing image read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let stored: StoredVolume =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))?;
        // Stored grids are untrusted: rebuild through the checked constructors.
        let grid = Grid::new(stored.grid.shape().to_vec())?
            .with_slab(stored.grid.slab_axis(), stored.grid.slab_step())?;
        if stored.data.len() != grid.len() {
            return Err(Error::InvalidInput(format!(
                "image '{}' holds {} values but its grid {:?} needs {}",
                path.display(),
                stored.data.len(),
                grid.shape(),
                grid.len()
            )));
        }
        let data = ArrayD::from_shape_vec(IxDyn(grid.shape()), stored.data)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            mode: OpenMode::Read,
            grid,
            data,
            pass_active: false,
        })
    }

    /// Writable image with no backing file.
    pub fn from_array(data: ArrayD<f64>, grid: Grid) -> Result<Self> {
        if data.shape() != grid.shape() {
            return Err(Error::ShapeMismatch {
                expected: grid.shape().to_vec(),
                found: data.shape().to_vec(),
            });
        }
        Ok(Self {
            path: None,
            mode: OpenMode::Write,
            grid,
            data,
            pass_active: false,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_array(self) -> ArrayD<f64> {
        self.data
    }

    /// Enter iteration.
    ///
    /// Starts a pass at unit 0 unless a pass is already active, in which case
    /// the cursor stays where it is. An exhausted pass stays exhausted until
    /// [`rewind`](Self::rewind).
    pub fn begin(&mut self) {
        if !self.pass_active {
            self.grid.rewind();
            self.pass_active = true;
        }
    }

    /// Hard reset of the cursor to unit 0.
    pub fn rewind(&mut self) {
        self.grid.rewind();
        self.pass_active = false;
    }

    /// Block at the cursor, then advance. `None` once the pass is complete.
    pub fn read_next(&mut self) -> Option<ArrayD<f64>> {
        let block = self.block_view()?.to_owned();
        self.grid.advance();
        Some(block)
    }

    /// Write `block` at the cursor, then advance.
    pub fn write_next(&mut self, block: ArrayViewD<'_, f64>) -> Result<()> {
        if self.mode == OpenMode::Read {
            return Err(Error::ReadOnly(self.path.clone().unwrap_or_default()));
        }
        let (Some(range), Some(expected)) = (self.grid.block_range(), self.grid.block_shape()) else {
            return Err(Error::GridExhausted(self.grid.units()));
        };
        if block.shape() != expected.as_slice() {
            return Err(Error::ShapeMismatch {
                expected,
                found: block.shape().to_vec(),
            });
        }

        let axis = Axis(self.grid.slab_axis());
        let mut target = self.data.slice_axis_mut(axis, Slice::from(range));
        if self.grid.slab_step() == 1 {
            target.index_axis_mut(axis, 0).assign(&block);
        } else {
            target.assign(&block);
        }
        self.grid.advance();
        Ok(())
    }

    /// Persist to the image's path.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Err(Error::InvalidInput("in-memory image has no path to save to".into()));
        };
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        self.write_to(file, path)
    }

    /// Persist to `path` without adopting it as the image's own path.
    pub fn save_as(&self, path: impl AsRef<Path>, overwrite: bool) -> Result<()> {
        let path = path.as_ref();
        let file = open_for_write(path, overwrite)?;
        self.write_to(file, path)
    }

    fn write_to(&self, file: File, path: &Path) -> Result<()> {
        let stored = StoredVolume {
            grid: self.grid.clone(),
            data: self.data.iter().copied().collect(),
        };
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &stored).map_err(|e| Error::json(path, e))?;
        writer.flush().map_err(|e| Error::io(path, e))
    }

    fn block_view(&self) -> Option<ArrayViewD<'_, f64>> {
        let range = self.grid.block_range()?;
        let axis = Axis(self.grid.slab_axis());
        let view = self.data.slice_axis(axis, Slice::from(range));
        if self.grid.slab_step() == 1 {
            Some(view.index_axis_move(axis, 0))
        } else {
            Some(view)
        }
    }
}

fn open_for_write(path: &Path, overwrite: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    options.open(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => Error::ImageExists(path.to_path_buf()),
        _ => Error::io(path, e),
    })
}
