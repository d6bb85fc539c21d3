//! Output sink: one result stream into one spatially addressed image.
//!
//! A sink is configured before fitting starts (`new`) and gets its image only
//! when `setup_destination` runs. From then on each iteration unit does
//! `begin` + `set_next`, and readers can walk the written blocks through the
//! sink's `Iterator` impl.

use std::fmt;
use std::fs;
use std::path::Path;

use ndarray::{Array1, ArrayD, ArrayViewD};

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::image::VolumeImage;
use crate::output::extract::ResultExtractor;

pub struct RegressionOutput<R> {
    /// Addressing of the input batches.
    grid: Grid,
    /// Addressing of the output image.
    outgrid: Grid,
    nout: usize,
    extractor: Box<dyn ResultExtractor<R>>,
    image: Option<VolumeImage>,
    /// `next` already reported the missing image.
    unmaterialized_reported: bool,
}

impl<R> RegressionOutput<R> {
    /// `outgrid` defaults to `grid`. No image is created here.
    pub fn new(
        grid: Grid,
        nout: usize,
        outgrid: Option<Grid>,
        extractor: impl ResultExtractor<R> + 'static,
    ) -> Result<Self> {
        Self::boxed(grid, nout, outgrid, Box::new(extractor))
    }

    pub fn boxed(
        grid: Grid,
        nout: usize,
        outgrid: Option<Grid>,
        extractor: Box<dyn ResultExtractor<R>>,
    ) -> Result<Self> {
        if nout == 0 {
            return Err(Error::InvalidNout(nout));
        }
        let outgrid = outgrid.unwrap_or_else(|| grid.clone());
        Ok(Self {
            grid,
            outgrid,
            nout,
            extractor,
            image: None,
            unmaterialized_reported: false,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn outgrid(&self) -> &Grid {
        &self.outgrid
    }

    pub fn nout(&self) -> usize {
        self.nout
    }

    pub fn image(&self) -> Option<&VolumeImage> {
        self.image.as_ref()
    }

    pub fn image_mut(&mut self) -> Option<&mut VolumeImage> {
        self.image.as_mut()
    }

    pub fn into_image(self) -> Option<VolumeImage> {
        self.image
    }

    /// Copy this sink's grid walk onto its own image and rewind it.
    pub fn sync_grid(&mut self) -> Result<()> {
        let Some(image) = self.image.as_mut() else {
            return Err(Error::NotMaterialized);
        };
        image.grid_mut().copy_iter(&self.grid)?;
        image.rewind();
        Ok(())
    }

    /// Same as [`sync_grid`](Self::sync_grid) for an image the sink does not own.
    pub fn sync_image_grid(&self, image: &mut VolumeImage) -> Result<()> {
        image.grid_mut().copy_iter(&self.grid)?;
        image.rewind();
        Ok(())
    }

    /// Enter iteration on the image; see [`VolumeImage::begin`].
    pub fn begin(&mut self) -> Result<&mut Self> {
        self.image.as_mut().ok_or(Error::NotMaterialized)?.begin();
        Ok(self)
    }

    /// Write one unit at the image cursor and advance.
    pub fn set_next(&mut self, data: ArrayViewD<'_, f64>) -> Result<()> {
        self.image
            .as_mut()
            .ok_or(Error::NotMaterialized)?
            .write_next(data)
    }

    pub fn extract(&self, results: &R) -> Result<Array1<f64>> {
        self.extractor.extract(results)
    }

    /// Create the image at `out_dir/<basename><ext>` and sync its grid.
    ///
    /// `out_dir` is created if missing. Fails with
    /// [`Error::ImageExists`] when the file exists and `overwrite` is false.
    pub fn setup_destination(
        &mut self,
        overwrite: bool,
        out_dir: &Path,
        ext: &str,
        basename: &str,
    ) -> Result<&mut VolumeImage> {
        if let Some(image) = &self.image {
            return Err(Error::AlreadyMaterialized(
                image.path().map(Path::to_path_buf).unwrap_or_default(),
            ));
        }

        fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
        let path = out_dir.join(format!("{basename}{ext}"));
        let mut image = VolumeImage::create(&path, self.outgrid.clone(), overwrite)?;
        self.sync_image_grid(&mut image)?;
        log::info!(
            "output {} ready: shape {:?}, nout {}",
            path.display(),
            self.outgrid.shape(),
            self.nout
        );
        Ok(self.image.insert(image))
    }
}

impl<R> Iterator for RegressionOutput<R> {
    type Item = Result<ArrayD<f64>>;

    /// Next written block from the image.
    ///
    /// Without an image this yields [`Error::NotMaterialized`] once, then ends.
    fn next(&mut self) -> Option<Self::Item> {
        match self.image.as_mut() {
            Some(image) => image.read_next().map(Ok),
            None if self.unmaterialized_reported => None,
            None => {
                self.unmaterialized_reported = true;
                Some(Err(Error::NotMaterialized))
            }
        }
    }
}

impl<R> fmt::Debug for RegressionOutput<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegressionOutput")
            .field("grid", &self.grid)
            .field("outgrid", &self.outgrid)
            .field("nout", &self.nout)
            .field("image", &self.image.as_ref().and_then(|i| i.path()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::extract::ExtractWith;
    use crate::test_support::scratch_dir;
    use ndarray::{Array, IxDyn};

    struct Unspecified;

    impl ResultExtractor<()> for Unspecified {}

    fn sink(grid: Grid, nout: usize, outgrid: Option<Grid>) -> RegressionOutput<Vec<f64>> {
        let extractor = ExtractWith(|r: &Vec<f64>| -> Result<Array1<f64>> { Ok(Array1::from(r.clone())) });
        RegressionOutput::new(grid, nout, outgrid, extractor).unwrap()
    }

    #[test]
    fn construction_performs_no_io_and_defaults_outgrid() {
        let grid = Grid::new(vec![2, 4, 4]).unwrap();
        let s = sink(grid.clone(), 1, None);
        assert_eq!(s.outgrid(), &grid);
        assert!(s.image().is_none());
    }

    #[test]
    fn nout_must_be_positive() {
        let grid = Grid::new(vec![2]).unwrap();
        let err = RegressionOutput::<()>::new(grid, 0, None, Unspecified).unwrap_err();
        assert!(matches!(err, Error::InvalidNout(0)));
    }

    #[test]
    fn base_extract_is_not_implemented() {
        let s = RegressionOutput::new(Grid::new(vec![2]).unwrap(), 1, None, Unspecified).unwrap();
        assert!(matches!(s.extract(&()), Err(Error::NotImplemented(_))));
    }

    #[test]
    fn operations_before_setup_fail_fast() {
        let mut s = sink(Grid::new(vec![2, 2]).unwrap(), 1, None);
        assert!(matches!(s.sync_grid(), Err(Error::NotMaterialized)));
        assert!(matches!(s.begin(), Err(Error::NotMaterialized)));
        let block = ArrayD::<f64>::zeros(IxDyn(&[2]));
        assert!(matches!(s.set_next(block.view()), Err(Error::NotMaterialized)));
        assert!(matches!(s.next(), Some(Err(Error::NotMaterialized))));
        assert!(s.next().is_none());
    }

    #[test]
    fn setup_creates_missing_directories_with_the_outgrid() {
        let root = scratch_dir("sink-setup");
        let out_dir = root.join("nested").join("maps");
        let grid = Grid::new(vec![1, 4, 4]).unwrap();
        let outgrid = grid.stacked(3).unwrap();
        let mut s = sink(grid, 3, Some(outgrid.clone()));

        let image = s.setup_destination(false, &out_dir, ".json", "beta").unwrap();
        assert_eq!(image.grid().shape(), outgrid.shape());
        assert_eq!(image.grid().slab_axis(), 1);
        assert!(out_dir.join("beta.json").exists());

        assert!(matches!(
            s.setup_destination(true, &out_dir, ".json", "beta"),
            Err(Error::AlreadyMaterialized(_))
        ));
    }

    #[test]
    fn setup_tolerates_an_existing_directory() {
        let out_dir = scratch_dir("sink-idempotent");
        let grid = Grid::new(vec![2, 2]).unwrap();
        let mut a = sink(grid.clone(), 1, None);
        let mut b = sink(grid, 1, None);
        a.setup_destination(false, &out_dir, ".json", "a").unwrap();
        b.setup_destination(false, &out_dir, ".json", "b").unwrap();
    }

    #[test]
    fn setup_respects_overwrite() {
        let out_dir = scratch_dir("sink-overwrite");
        let grid = Grid::new(vec![2, 2]).unwrap();
        sink(grid.clone(), 1, None)
            .setup_destination(false, &out_dir, ".json", "x")
            .unwrap();
        let err = sink(grid.clone(), 1, None)
            .setup_destination(false, &out_dir, ".json", "x")
            .unwrap_err();
        assert!(matches!(err, Error::ImageExists(_)));
        sink(grid, 1, None)
            .setup_destination(true, &out_dir, ".json", "x")
            .unwrap();
    }

    #[test]
    fn written_blocks_read_back_through_iteration() {
        let out_dir = scratch_dir("sink-iterate");
        let mut s = sink(Grid::new(vec![3, 2]).unwrap(), 1, None);
        s.setup_destination(false, &out_dir, ".json", "v").unwrap();

        for k in 0..3 {
            let block = Array::from_elem(IxDyn(&[2]), k as f64);
            s.begin().unwrap().set_next(block.view()).unwrap();
        }

        // The write pass is exhausted until the grid is synced again.
        assert!(s.begin().unwrap().next().is_none());
        s.sync_grid().unwrap();
        let blocks: Vec<ArrayD<f64>> = s.begin().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], Array::from_elem(IxDyn(&[2]), 2.0));
    }

    #[test]
    fn sync_grid_copies_the_walk_and_rewinds() {
        let out_dir = scratch_dir("sink-sync");
        let grid = Grid::new(vec![4, 3]).unwrap().with_slab(0, 2).unwrap();
        let outgrid = grid.stacked(2).unwrap();
        let mut s = sink(grid, 2, Some(outgrid));
        s.setup_destination(false, &out_dir, ".json", "pair").unwrap();

        let block = ArrayD::<f64>::ones(IxDyn(&[2, 2, 3]));
        s.begin().unwrap().set_next(block.view()).unwrap();
        assert_eq!(s.image().unwrap().grid().position(), 1);

        // Knock the image walk off the sink's walk, then sync it back.
        let image = s.image_mut().unwrap();
        image.grid_mut().copy_iter(&Grid::new(vec![2, 4, 3]).unwrap()).unwrap();
        image.grid_mut().advance();
        assert_eq!(image.grid().slab_axis(), 0);

        s.sync_grid().unwrap();
        let synced = s.image().unwrap().grid();
        assert_eq!(synced.slab_axis(), 1);
        assert_eq!(synced.slab_step(), 2);
        assert_eq!(synced.position(), 0);
        assert_eq!(synced.block_shape(), Some(vec![2, 2, 3]));
    }
}
