use std::collections::BTreeMap;

use crate::contour::{Contour, SliceContour};

/// Groups voxel-space contours by the slices they occupy and merges every
/// group into a single [`SliceContour`]. The first contour found on a slice
/// is the primary one, the rest are folded into it.
pub fn merge_by_slice(contours: &[Contour]) -> Vec<SliceContour> {
    let mut by_slice: BTreeMap<i64, Vec<&Contour>> = BTreeMap::new();
    for contour in contours {
        for slice in contour.which_slices() {
            by_slice.entry(slice).or_default().push(contour);
        }
    }

    by_slice
        .into_iter()
        .filter_map(|(slice, members)| {
            let (primary, secondary) = members.split_first()?;
            Some(primary.merge(secondary, slice))
        })
        .collect()
}
