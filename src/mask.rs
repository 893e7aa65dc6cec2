use image::{ImageBuffer, Luma};
use ndarray::{Array3, ArrayView2, Axis};
use rayon::prelude::*;

use crate::grid::VoxelGrid;

/// Voxel mask of a single ROI, registered to `grid`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    roi_name: String,
    sample_name: Option<String>,
    modality: String,
    data: Array3<bool>,
    grid: VoxelGrid,
}

impl Mask {
    pub fn new(
        roi_name: String,
        sample_name: Option<String>,
        modality: String,
        data: Array3<bool>,
        grid: VoxelGrid,
    ) -> Self {
        Self {
            roi_name,
            sample_name,
            modality,
            data,
            grid,
        }
    }

    pub fn roi_name(&self) -> &str {
        &self.roi_name
    }

    pub fn sample_name(&self) -> Option<&str> {
        self.sample_name.as_deref()
    }

    pub fn modality(&self) -> &str {
        &self.modality
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Get a reference to the underlying data (depth, height, width)
    pub fn data(&self) -> &Array3<bool> {
        &self.data
    }

    pub fn into_data(self) -> Array3<bool> {
        self.data
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn voxel_count(&self) -> usize {
        self.data.iter().filter(|&&voxel| voxel).count()
    }

    pub fn slice(&self, index: usize) -> Option<ArrayView2<'_, bool>> {
        (index < self.data.len_of(Axis(0))).then(|| self.data.index_axis(Axis(0), index))
    }

    /// Renders one slice as an 8-bit image, foreground white.
    pub fn slice_to_image(&self, index: usize) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.slice(index)?;
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&voxel| if voxel { u8::MAX } else { 0 })
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}
