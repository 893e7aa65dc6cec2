//! Decides whether the grid of the reference image can hold a ROI mask.
//!
//! Contours drawn on the image they accompany map onto its slices exactly.
//! When that cannot be confirmed from geometry and provenance, a grid is
//! derived from the contours instead (see [`crate::synthetic`]).

use std::collections::HashSet;

use tracing::debug;

use crate::grid;
use crate::reference::ReferenceImage;
use crate::structure_set::{RoiContour, StructureSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceStrategy {
    pub use_reference_image: bool,
    /// Every contour lies in a slice plane of the reference image.
    pub orientation_usable: bool,
    /// Every contour lies on an integer slice index of the reference image.
    pub position_usable: bool,
}

impl ReferenceStrategy {
    const fn new(use_reference_image: bool, orientation_usable: bool, position_usable: bool) -> Self {
        Self {
            use_reference_image,
            orientation_usable,
            position_usable,
        }
    }

    pub const ACCEPT: Self = Self::new(true, true, true);
    pub const NO_REFERENCE: Self = Self::new(false, false, false);

    pub fn select(
        structure_set: &StructureSet,
        roi_contour: &RoiContour,
        image: Option<&ReferenceImage>,
    ) -> Self {
        let Some(image) = image else {
            return Self::NO_REFERENCE;
        };

        let series_uid_match = series_uid_matches(structure_set, image);
        let sop_uid_match = sop_uids_match(structure_set, roi_contour, image);

        let contours: Vec<_> = roi_contour
            .collect_contours()
            .iter()
            .map(|contour| contour.to_voxel(&image.grid))
            .collect();
        if contours.is_empty() {
            return Self::ACCEPT;
        }

        let orientation_usable = contours.iter().all(|contour| contour.is_planar());
        let position_usable = contours.iter().all(|contour| contour.is_on_slice());
        if !orientation_usable || !position_usable {
            debug!(
                orientation_usable,
                position_usable, "Contours do not map onto reference image slices"
            );
            return Self::new(false, orientation_usable, position_usable);
        }

        let positions = grid::unique_sorted(
            contours
                .iter()
                .flat_map(|contour| contour.slice_coordinates()),
        );
        let Some(gap) = grid::min_gap(&positions) else {
            return Self::ACCEPT;
        };

        if !grid::is_close(gap, 1.0) && !series_uid_match && !sop_uid_match {
            debug!(
                gap,
                "Contour slices are not adjacent and do not reference the image"
            );
            return Self::new(false, true, false);
        }

        Self::ACCEPT
    }
}

fn series_uid_matches(structure_set: &StructureSet, image: &ReferenceImage) -> bool {
    match (&structure_set.series_instance_uid, &image.series_instance_uid) {
        (Some(own), Some(reference)) => own == reference,
        _ => false,
    }
}

/// All images referenced by the ROI (and by the structure set's frame of
/// reference) must be slices of the reference image. A single reference is
/// not enough to confirm this.
fn sop_uids_match(
    structure_set: &StructureSet,
    roi_contour: &RoiContour,
    image: &ReferenceImage,
) -> bool {
    if image.sop_instance_uids.is_empty() {
        return false;
    }

    let referenced: HashSet<&str> = roi_contour
        .referenced_sop_instance_uids()
        .chain(
            structure_set
                .referenced_sop_instance_uids
                .iter()
                .map(String::as_str),
        )
        .collect();
    if referenced.len() <= 1 {
        return false;
    }

    let available: HashSet<&str> = image.sop_instance_uids.iter().map(String::as_str).collect();
    referenced.is_subset(&available)
}
