//! Typed view of an RT structure set, as handed over by the metadata layer.
//!
//! Points are kept as stored in the file, `(x, y, z)` in patient
//! coordinates. [`RoiContour::collect_contours`] converts them into
//! [`Contour`]s in the `(z, y, x)` convention used by the rest of the crate.

use nalgebra::Vector3;
use tracing::warn;

use crate::contour::Contour;
use crate::enums::{GeometricType, RoiSelection};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawContour {
    pub geometric_type: Option<GeometricType>,
    pub points: Vec<[f64; 3]>,
    pub offset: Option<[f64; 3]>,
    /// Images this contour was drawn on (Contour Image Sequence).
    pub referenced_sop_instance_uids: Vec<String>,
}

impl RawContour {
    pub fn closed_planar(points: Vec<[f64; 3]>) -> Self {
        Self {
            geometric_type: Some(GeometricType::ClosedPlanar),
            points,
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, offset: [f64; 3]) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_referenced_sop_instance_uid(mut self, uid: impl Into<String>) -> Self {
        self.referenced_sop_instance_uids.push(uid.into());
        self
    }

    fn to_contour(&self) -> Option<Contour> {
        if self.geometric_type != Some(GeometricType::ClosedPlanar) || self.points.is_empty() {
            return None;
        }
        let [offset_x, offset_y, offset_z] = self.offset.unwrap_or([0.0; 3]);
        let points = self
            .points
            .iter()
            .map(|&[x, y, z]| Vector3::new(z - offset_z, y - offset_y, x - offset_x))
            .collect();
        Some(Contour::new(points))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoiDefinition {
    pub number: Option<i32>,
    pub name: Option<String>,
    pub referenced_frame_of_reference_uid: Option<String>,
}

impl RoiDefinition {
    pub fn new(number: i32, name: impl Into<String>) -> Self {
        Self {
            number: Some(number),
            name: Some(name.into()),
            referenced_frame_of_reference_uid: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoiContour {
    pub referenced_roi_number: Option<i32>,
    pub contours: Vec<RawContour>,
}

impl RoiContour {
    pub fn new(referenced_roi_number: i32, contours: Vec<RawContour>) -> Self {
        Self {
            referenced_roi_number: Some(referenced_roi_number),
            contours,
        }
    }

    /// Closed planar contours of this ROI. Other geometric types are skipped.
    pub fn collect_contours(&self) -> Vec<Contour> {
        self.contours
            .iter()
            .filter_map(RawContour::to_contour)
            .collect()
    }

    pub fn referenced_sop_instance_uids(&self) -> impl Iterator<Item = &str> {
        self.contours
            .iter()
            .flat_map(|contour| contour.referenced_sop_instance_uids.iter())
            .map(String::as_str)
    }
}

/// ROI names present in a structure set, for listing purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiLabels {
    pub sample_name: Option<String>,
    pub labels: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureSet {
    pub sample_name: Option<String>,
    pub modality: String,
    /// Series the structure set was drawn on.
    pub series_instance_uid: Option<String>,
    pub frame_of_reference_uid: Option<String>,
    /// Structure Set ROI Sequence; `None` if the sequence is absent.
    pub rois: Option<Vec<RoiDefinition>>,
    pub roi_contours: Vec<RoiContour>,
    /// Images listed under the Referenced Frame of Reference Sequence.
    pub referenced_sop_instance_uids: Vec<String>,
}

impl Default for StructureSet {
    fn default() -> Self {
        Self {
            sample_name: None,
            modality: "RTSTRUCT".to_string(),
            series_instance_uid: None,
            frame_of_reference_uid: None,
            rois: None,
            roi_contours: Vec::new(),
            referenced_sop_instance_uids: Vec::new(),
        }
    }
}

impl StructureSet {
    /// Whether the structure set can be converted to masks at all. Problems
    /// are reported as warnings.
    pub fn check(&self) -> bool {
        let Some(rois) = &self.rois else {
            warn!(
                sample = self.sample_name.as_deref().unwrap_or_default(),
                "Structure set does not contain a Structure Set ROI Sequence"
            );
            return false;
        };

        if rois.is_empty() {
            warn!(
                sample = self.sample_name.as_deref().unwrap_or_default(),
                "Structure set does not contain any ROI"
            );
            return false;
        }

        if rois.iter().any(|roi| roi.name.is_none()) {
            warn!(
                sample = self.sample_name.as_deref().unwrap_or_default(),
                "Structure set lacks one or more ROI names"
            );
            return false;
        }

        true
    }

    /// Frame of reference UID of the file, falling back to the first one
    /// referenced by an ROI.
    pub fn frame_of_reference_uid(&self) -> Option<&str> {
        self.frame_of_reference_uid.as_deref().or_else(|| {
            self.rois.as_ref().and_then(|rois| {
                rois.iter()
                    .find_map(|roi| roi.referenced_frame_of_reference_uid.as_deref())
            })
        })
    }

    /// ROI numbers selected by `selection`, paired with the name of the
    /// mask they produce.
    pub fn selected_rois(&self, selection: &RoiSelection) -> Vec<(i32, String)> {
        self.rois
            .iter()
            .flatten()
            .filter_map(|roi| {
                let number = roi.number?;
                let name = roi.name.as_deref()?;
                selection.output_name(name).map(|output| (number, output))
            })
            .collect()
    }

    pub fn roi_labels(&self) -> RoiLabels {
        RoiLabels {
            sample_name: self.sample_name.clone(),
            labels: self
                .rois
                .iter()
                .flatten()
                .map(|roi| roi.name.clone())
                .collect(),
        }
    }
}
