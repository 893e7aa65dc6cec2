//! Reads reference image geometry and RT structure sets from DICOM.

use crate::enums::GeometricType;
use crate::grid::{self, VoxelGrid};
use crate::reference::ReferenceImage;
use crate::structure_set::{RawContour, RoiContour, RoiDefinition, StructureSet};

use dicom::core::Tag;
use dicom::object::{FileDicomObject, InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use nalgebra::{Matrix3, Vector3};
use std::{fs, path::Path};
use thiserror::Error;
use tracing::debug;

/// Contour Offset Vector (retired).
const CONTOUR_OFFSET_VECTOR: Tag = Tag(0x3006, 0x0045);

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

fn string(dataset: &InMemDicomObject, tag: Tag) -> Option<String> {
    let value = dataset.element(tag).ok()?.to_str().ok()?;
    let value = value.trim_end_matches('\0').trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn int(dataset: &InMemDicomObject, tag: Tag) -> Option<i32> {
    dataset.element(tag).ok()?.to_int::<i32>().ok()
}

fn floats(dataset: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    dataset.element(tag).ok()?.to_multi_float64().ok()
}

fn vector(dataset: &InMemDicomObject, tag: Tag) -> Option<Vector3<f64>> {
    match floats(dataset, tag)?.as_slice() {
        &[x, y, z] => Some(Vector3::new(x, y, z)),
        _ => None,
    }
}

fn items(dataset: &InMemDicomObject, tag: Tag) -> &[InMemDicomObject] {
    dataset
        .element(tag)
        .ok()
        .and_then(|element| element.items())
        .unwrap_or_default()
}

/// Patient coordinates `(x, y, z)` to the `(z, y, x)` order used for grids.
#[inline]
fn zyx(vector: Vector3<f64>) -> Vector3<f64> {
    Vector3::new(vector.z, vector.y, vector.x)
}

struct SliceGeometry {
    position: Vector3<f64>,
    row_direction: Vector3<f64>,
    column_direction: Vector3<f64>,
    pixel_spacing: (f64, f64),
    rows: usize,
    columns: usize,
    sop_instance_uid: Option<String>,
}

impl SliceGeometry {
    fn read(dataset: &InMemDicomObject) -> Option<Self> {
        let position = vector(dataset, tags::IMAGE_POSITION_PATIENT)?;
        let cosines = floats(dataset, tags::IMAGE_ORIENTATION_PATIENT)?;
        let &[rx, ry, rz, cx, cy, cz] = cosines.as_slice() else {
            return None;
        };
        let spacing = floats(dataset, tags::PIXEL_SPACING)?;
        let &[row_spacing, column_spacing] = spacing.as_slice() else {
            return None;
        };

        Some(Self {
            position,
            row_direction: Vector3::new(rx, ry, rz),
            column_direction: Vector3::new(cx, cy, cz),
            pixel_spacing: (row_spacing, column_spacing),
            rows: usize::try_from(int(dataset, tags::ROWS)?).ok()?,
            columns: usize::try_from(int(dataset, tags::COLUMNS)?).ok()?,
            sop_instance_uid: string(dataset, tags::SOP_INSTANCE_UID),
        })
    }

    fn normal(&self) -> Vector3<f64> {
        self.row_direction.cross(&self.column_direction)
    }
}

pub struct ImageLoader;

impl ImageLoader {
    /// Load reference image geometry from the slices of a DICOM series
    ///
    /// # Arguments
    ///
    /// * `datasets` - One dataset per slice, in any order
    ///
    /// # Errors
    ///
    /// Returns error if no slice carries complete geometry, or if slices
    /// differ in size
    pub fn load_from_datasets(datasets: &[&InMemDicomObject]) -> Result<ReferenceImage, LoaderError> {
        let mut slices: Vec<_> = datasets
            .iter()
            .filter_map(|dataset| SliceGeometry::read(dataset))
            .collect();
        let Some(first) = slices.first() else {
            return Err(LoaderError::NoValidImages);
        };
        if slices
            .iter()
            .any(|slice| (slice.rows, slice.columns) != (first.rows, first.columns))
        {
            return Err(LoaderError::InconsistentDimensions);
        }

        let normal = first.normal();
        slices.sort_by(|a, b| a.position.dot(&normal).total_cmp(&b.position.dot(&normal)));

        let base = slices[0].position.dot(&normal);
        let slice_positions: Vec<f64> = slices
            .iter()
            .map(|slice| slice.position.dot(&normal) - base)
            .collect();

        let slice_spacing = grid::min_gap(&grid::unique_sorted(slice_positions.iter().copied()))
            .filter(|&gap| gap > 0.0)
            .or_else(|| {
                datasets
                    .iter()
                    .find_map(|dataset| floats(dataset, tags::SLICE_THICKNESS)?.first().copied())
            })
            .ok_or(LoaderError::MissingSpacing)?;

        let reference = &slices[0];
        let (row_spacing, column_spacing) = reference.pixel_spacing;
        let grid = VoxelGrid::new(
            zyx(reference.position),
            Vector3::new(slice_spacing, row_spacing, column_spacing),
            [slices.len(), reference.rows, reference.columns],
            Matrix3::from_columns(&[
                zyx(normal),
                zyx(reference.column_direction),
                zyx(reference.row_direction),
            ]),
        );
        debug!(dimension = ?grid.dimension, spacing = ?grid.spacing, "Loaded image geometry");

        let dataset = datasets[0];
        Ok(ReferenceImage {
            grid,
            slice_positions,
            series_instance_uid: string(dataset, tags::SERIES_INSTANCE_UID),
            sop_instance_uids: slices
                .iter()
                .filter_map(|slice| slice.sop_instance_uid.clone())
                .collect(),
            modality: string(dataset, tags::MODALITY),
            sample_name: string(dataset, tags::PATIENT_ID),
        })
    }

    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
    ) -> Result<ReferenceImage, LoaderError> {
        let datasets: Vec<&InMemDicomObject> = dicom_objects.iter().map(|object| &**object).collect();
        Self::load_from_datasets(&datasets)
    }

    /// Load reference image geometry from file paths
    pub fn load_from_file_paths(paths: &[impl AsRef<Path>]) -> Result<ReferenceImage, LoaderError> {
        let objects: Result<Vec<_>, _> = paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?)
    }

    /// Load reference image geometry from a directory containing .dcm files
    pub fn load_from_directory(path: impl AsRef<Path>) -> Result<ReferenceImage, LoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(LoaderError::NoValidImages);
        }

        Self::load_from_file_paths(&paths)
    }
}

pub struct StructureSetLoader;

impl StructureSetLoader {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<StructureSet, LoaderError> {
        let object = open_file(path.as_ref())?;
        Ok(Self::load_from_dataset(&object))
    }

    pub fn load_from_dataset(dataset: &InMemDicomObject) -> StructureSet {
        let referenced_series: Vec<&InMemDicomObject> =
            items(dataset, tags::REFERENCED_FRAME_OF_REFERENCE_SEQUENCE)
                .iter()
                .flat_map(|frame| items(frame, tags::RT_REFERENCED_STUDY_SEQUENCE))
                .flat_map(|study| items(study, tags::RT_REFERENCED_SERIES_SEQUENCE))
                .collect();

        let series_instance_uid = referenced_series
            .iter()
            .find_map(|series| string(series, tags::SERIES_INSTANCE_UID))
            .or_else(|| string(dataset, tags::SERIES_INSTANCE_UID));

        let rois = dataset
            .element(tags::STRUCTURE_SET_ROI_SEQUENCE)
            .is_ok()
            .then(|| {
                items(dataset, tags::STRUCTURE_SET_ROI_SEQUENCE)
                    .iter()
                    .map(|roi| RoiDefinition {
                        number: int(roi, tags::ROI_NUMBER),
                        name: string(roi, tags::ROI_NAME),
                        referenced_frame_of_reference_uid: string(
                            roi,
                            tags::REFERENCED_FRAME_OF_REFERENCE_UID,
                        ),
                    })
                    .collect()
            });

        StructureSet {
            sample_name: string(dataset, tags::PATIENT_ID),
            modality: string(dataset, tags::MODALITY).unwrap_or_else(|| "RTSTRUCT".to_string()),
            series_instance_uid,
            frame_of_reference_uid: string(dataset, tags::FRAME_OF_REFERENCE_UID),
            rois,
            roi_contours: items(dataset, tags::ROI_CONTOUR_SEQUENCE)
                .iter()
                .map(Self::roi_contour)
                .collect(),
            referenced_sop_instance_uids: referenced_series
                .iter()
                .flat_map(|series| Self::referenced_images(series))
                .collect(),
        }
    }

    fn roi_contour(dataset: &InMemDicomObject) -> RoiContour {
        RoiContour {
            referenced_roi_number: int(dataset, tags::REFERENCED_ROI_NUMBER),
            contours: items(dataset, tags::CONTOUR_SEQUENCE)
                .iter()
                .map(|contour| RawContour {
                    geometric_type: string(contour, tags::CONTOUR_GEOMETRIC_TYPE)
                        .map(|value| GeometricType::from(value.as_str())),
                    points: floats(contour, tags::CONTOUR_DATA)
                        .unwrap_or_default()
                        .chunks_exact(3)
                        .map(|point| [point[0], point[1], point[2]])
                        .collect(),
                    offset: vector(contour, CONTOUR_OFFSET_VECTOR).map(|offset| offset.into()),
                    referenced_sop_instance_uids: Self::referenced_images(contour),
                })
                .collect(),
        }
    }

    fn referenced_images(dataset: &InMemDicomObject) -> Vec<String> {
        items(dataset, tags::CONTOUR_IMAGE_SEQUENCE)
            .iter()
            .filter_map(|image| string(image, tags::REFERENCED_SOP_INSTANCE_UID))
            .collect()
    }
}
