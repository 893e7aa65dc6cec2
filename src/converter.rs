use std::borrow::Cow;
use std::str::FromStr;

use ndarray::{Array3, Axis, Zip};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::connectivity;
use crate::contour::Contour;
use crate::enums::{DisconnectedSegments, RasterMethod, RoiSelection};
use crate::mask::Mask;
use crate::merger;
use crate::rasterizer::{RasterizedSlice, Rasterizer};
use crate::reference::ReferenceImage;
use crate::slice_matcher;
use crate::strategy::ReferenceStrategy;
use crate::structure_set::{RoiContour, StructureSet};
use crate::synthetic;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("Converting a structure set to masks requires a reference image, none was provided")]
    MissingReferenceImage,

    #[error(
        "The requested method ({0}) for converting contours to a mask is not available. Currently available: {available}",
        available = RasterMethod::AVAILABLE.join(", ")
    )]
    MethodNotImplemented(String),

    #[error("Unknown disconnected segments policy ({0}). Expected keep_as_is or keep_largest")]
    UnknownDisconnectedSegments(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionOptions {
    pub roi_selection: RoiSelection,
    pub disconnected_segments: DisconnectedSegments,
    pub method: RasterMethod,
}

impl ConversionOptions {
    pub fn with_roi_selection(mut self, roi_selection: impl Into<RoiSelection>) -> Self {
        self.roi_selection = roi_selection.into();
        self
    }

    pub fn with_disconnected_segments(mut self, policy: DisconnectedSegments) -> Self {
        self.disconnected_segments = policy;
        self
    }

    /// Selects the rasterization method by name.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::MethodNotImplemented`] for unknown names.
    pub fn with_method_name(mut self, name: &str) -> Result<Self, MaskError> {
        self.method = RasterMethod::from_str(name)?;
        Ok(self)
    }
}

pub struct MaskConverter;

impl MaskConverter {
    /// Convert the ROIs of a structure set to voxel masks
    ///
    /// # Arguments
    ///
    /// * `structure_set` - Contours and identifiers of the structure set
    /// * `image` - Image the structure set was drawn on
    /// * `options` - ROI selection, rasterization method and segment policy
    ///
    /// ROIs are converted in parallel. ROIs without contours on the image
    /// produce no mask; the output keeps the order of the ROI contour
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns error if no reference image is given
    pub fn convert(
        structure_set: &StructureSet,
        image: Option<&ReferenceImage>,
        options: &ConversionOptions,
    ) -> Result<Vec<Mask>, MaskError> {
        let image = image.ok_or(MaskError::MissingReferenceImage)?;

        if !structure_set.check() {
            return Ok(Vec::new());
        }

        let selected = structure_set.selected_rois(&options.roi_selection);
        if selected.is_empty() {
            debug!("No ROI matches the selection");
            return Ok(Vec::new());
        }

        let masks: Vec<Mask> = structure_set
            .roi_contours
            .par_iter()
            .filter_map(|roi_contour| {
                let number = roi_contour.referenced_roi_number?;
                let (_, roi_name) = selected.iter().find(|(selected, _)| *selected == number)?;
                Self::convert_roi(structure_set, roi_contour, roi_name, image, options)
            })
            .collect();

        info!(
            masks = masks.len(),
            sample = structure_set.sample_name.as_deref().unwrap_or_default(),
            "Converted structure set"
        );
        Ok(masks)
    }

    fn convert_roi(
        structure_set: &StructureSet,
        roi_contour: &RoiContour,
        roi_name: &str,
        image: &ReferenceImage,
        options: &ConversionOptions,
    ) -> Option<Mask> {
        let contours = roi_contour.collect_contours();
        if contours.is_empty() {
            debug!(roi = roi_name, "ROI has no closed planar contours");
            return None;
        }

        let strategy = ReferenceStrategy::select(structure_set, roi_contour, Some(image));
        debug!(roi = roi_name, ?strategy, "Selected reference strategy");

        let target = if strategy.use_reference_image {
            Cow::Borrowed(image)
        } else {
            Cow::Owned(image.regridded(synthetic::build_grid(&contours, image, strategy)))
        };

        let data = Self::contours_to_mask(
            &contours,
            &target,
            options.method,
            options.disconnected_segments,
        )?;
        if !data.iter().any(|&voxel| voxel) {
            debug!(roi = roi_name, "ROI mask is empty");
            return None;
        }

        Some(Mask::new(
            roi_name.to_string(),
            structure_set
                .sample_name
                .clone()
                .or_else(|| image.sample_name.clone()),
            structure_set.modality.clone(),
            data,
            target.grid.clone(),
        ))
    }

    /// Rasterize world-space contours onto the grid of `image`.
    ///
    /// Returns `None` if no contour slice falls inside the image.
    pub fn contours_to_mask(
        contours: &[Contour],
        image: &ReferenceImage,
        method: RasterMethod,
        disconnected_segments: DisconnectedSegments,
    ) -> Option<Array3<bool>> {
        let voxel_contours: Vec<Contour> = contours
            .iter()
            .map(|contour| contour.to_voxel(&image.grid))
            .collect();

        let shape = image.grid.slice_shape();
        let slices: Vec<RasterizedSlice> = merger::merge_by_slice(&voxel_contours)
            .iter()
            .map(|contour| Rasterizer::rasterize(method, contour, shape))
            .collect();
        if slices.is_empty() {
            return None;
        }

        let matched = slice_matcher::match_slices(
            slices,
            &image.slice_positions,
            image.grid.spacing[0],
            image.grid.dimension[0],
        );
        if matched.is_empty() {
            return None;
        }

        let mut mask = Array3::from_elem(image.grid.shape(), false);
        for (index, slice) in matched {
            Zip::from(mask.index_axis_mut(Axis(0), index))
                .and(&slice)
                .for_each(|voxel, &drawn| *voxel |= drawn);
        }

        if disconnected_segments == DisconnectedSegments::KeepLargest {
            mask = connectivity::keep_largest(&mask);
        }

        Some(mask)
    }
}
