use std::collections::BTreeMap;
use std::str::FromStr;

use crate::converter::MaskError;

/// Which ROIs of a structure set are converted, and under which name they
/// are reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoiSelection {
    #[default]
    All,
    Name(String),
    Names(Vec<String>),
    /// Keys select ROIs, values are the names of the resulting masks.
    Rename(BTreeMap<String, String>),
}

impl RoiSelection {
    pub fn contains(&self, roi_name: &str) -> bool {
        match self {
            RoiSelection::All => true,
            RoiSelection::Name(name) => name == roi_name,
            RoiSelection::Names(names) => names.iter().any(|name| name == roi_name),
            RoiSelection::Rename(mapping) => mapping.contains_key(roi_name),
        }
    }

    /// Name under which a selected ROI is emitted.
    pub fn output_name(&self, roi_name: &str) -> Option<String> {
        match self {
            RoiSelection::Rename(mapping) => mapping.get(roi_name).cloned(),
            _ if self.contains(roi_name) => Some(roi_name.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for RoiSelection {
    fn from(name: &str) -> Self {
        RoiSelection::Name(name.to_string())
    }
}

impl From<Vec<String>> for RoiSelection {
    fn from(names: Vec<String>) -> Self {
        RoiSelection::Names(names)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for RoiSelection {
    fn from(pairs: [(&str, &str); N]) -> Self {
        RoiSelection::Rename(
            pairs
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectedSegments {
    #[default]
    KeepAsIs,
    KeepLargest,
}

impl FromStr for DisconnectedSegments {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_as_is" => Ok(DisconnectedSegments::KeepAsIs),
            "keep_largest" => Ok(DisconnectedSegments::KeepLargest),
            other => Err(MaskError::UnknownDisconnectedSegments(other.to_string())),
        }
    }
}

/// Method used to draw a polygon contour onto a slice grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RasterMethod {
    #[default]
    RayCast,
    // TODO: scanline fill with partial-volume weighting
}

impl RasterMethod {
    pub const AVAILABLE: &'static [&'static str] = &["ray_cast"];
}

impl FromStr for RasterMethod {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ray_cast" => Ok(RasterMethod::RayCast),
            other => Err(MaskError::MethodNotImplemented(other.to_string())),
        }
    }
}

/// Contour geometric type (3006,0042). Only closed planar polygons can be
/// rasterized; everything else is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometricType {
    ClosedPlanar,
    OpenPlanar,
    OpenNonplanar,
    Point,
    Other(String),
}

impl From<&str> for GeometricType {
    fn from(value: &str) -> Self {
        match value.trim() {
            "CLOSED_PLANAR" => GeometricType::ClosedPlanar,
            "OPEN_PLANAR" => GeometricType::OpenPlanar,
            "OPEN_NONPLANAR" => GeometricType::OpenNonplanar,
            "POINT" => GeometricType::Point,
            other => GeometricType::Other(other.to_string()),
        }
    }
}
