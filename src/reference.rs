use crate::grid::VoxelGrid;

/// Geometry and identifiers of the image a mask is registered to.
///
/// Only the geometry is carried; voxel intensities are never needed to
/// rasterize contours.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub grid: VoxelGrid,
    /// Offsets of the slices along the slice normal from the grid origin, in
    /// slice order.
    pub slice_positions: Vec<f64>,
    pub series_instance_uid: Option<String>,
    /// SOP instance UID of every slice. Single-frame images carry one.
    pub sop_instance_uids: Vec<String>,
    pub modality: Option<String>,
    pub sample_name: Option<String>,
}

impl ReferenceImage {
    /// Reference image whose slice positions are derived from the grid.
    pub fn from_grid(grid: VoxelGrid) -> Self {
        let slice_positions = grid.slice_positions();
        Self {
            grid,
            slice_positions,
            series_instance_uid: None,
            sop_instance_uids: Vec::new(),
            modality: None,
            sample_name: None,
        }
    }

    pub fn with_series_instance_uid(mut self, uid: impl Into<String>) -> Self {
        self.series_instance_uid = Some(uid.into());
        self
    }

    pub fn with_sop_instance_uids<S: Into<String>>(
        mut self,
        uids: impl IntoIterator<Item = S>,
    ) -> Self {
        self.sop_instance_uids = uids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    pub fn with_sample_name(mut self, sample_name: impl Into<String>) -> Self {
        self.sample_name = Some(sample_name.into());
        self
    }

    /// Copy of this image that describes `grid` instead. Identifiers are
    /// dropped because they no longer describe the new grid.
    pub(crate) fn regridded(&self, grid: VoxelGrid) -> Self {
        Self {
            modality: self.modality.clone(),
            sample_name: self.sample_name.clone(),
            ..Self::from_grid(grid)
        }
    }
}
