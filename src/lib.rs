//! # RT-STRUCT mask library
//!
//! This crate converts the contours of DICOM RT structure sets into boolean
//! voxel masks that are registered to an image grid, ready for downstream
//! quantitative analysis.
//!
//! Contours are closed planar polygons in patient coordinates. Each ROI is
//! processed on its own:
//!  - Decide whether the grid of the reference image can hold the mask. This
//!    requires every contour to lie exactly on an image slice, and slices to
//!    be adjacent unless the structure set references the image series or its
//!    instances.
//!  - Otherwise derive a grid from the contours, using the principal axes of
//!    the contour points for the orientation.
//!  - Transform contours to voxel space, merge contours that share a slice and
//!    fill them by ray casting (even-odd rule, so nested contours become holes).
//!  - Match rasterized slices to image slices, drop slices outside the image
//!    and optionally keep only the largest connected region.
//!
//! ROIs are converted in parallel using rayon. ROIs that do not overlap the
//! image produce no mask.
//!
//! Coordinates are ordered `(z, y, x)` throughout, matching the
//! `(depth, height, width)` layout of the mask arrays.
//!
//! # Examples
//!
//! ## Converting a structure set
//!
//! Load the image series from the `dicom/` directory and convert the `GTV`
//! ROI of an RT structure set, reporting it as `tumour`.
//!
//! ```no_run
//! # use rtstruct_mask::{ConversionOptions, DisconnectedSegments, ImageLoader, MaskConverter, StructureSetLoader};
//! let image = ImageLoader::load_from_directory("dicom")
//!     .expect("should have loaded image geometry from directory");
//! let structure_set = StructureSetLoader::load_from_file("rtstruct.dcm")
//!     .expect("should have loaded structure set");
//! let options = ConversionOptions::default()
//!     .with_roi_selection([("GTV", "tumour")])
//!     .with_disconnected_segments(DisconnectedSegments::KeepLargest);
//! let masks = MaskConverter::convert(&structure_set, Some(&image), &options)
//!     .expect("should have converted contours");
//! for mask in &masks {
//!     println!("{}: {} voxels", mask.roi_name(), mask.voxel_count());
//! }
//! ```

pub mod connectivity;
pub mod contour;
pub mod converter;
pub mod enums;
pub mod grid;
pub mod loader;
pub mod mask;
pub mod merger;
pub mod rasterizer;
pub mod reference;
pub mod slice_matcher;
pub mod strategy;
pub mod structure_set;
pub mod synthetic;

pub use converter::{ConversionOptions, MaskConverter, MaskError};
pub use enums::{DisconnectedSegments, GeometricType, RasterMethod, RoiSelection};
pub use grid::VoxelGrid;
pub use loader::{ImageLoader, LoaderError, StructureSetLoader};
pub use mask::Mask;
pub use reference::ReferenceImage;
pub use strategy::ReferenceStrategy;
pub use structure_set::{RawContour, RoiContour, RoiDefinition, StructureSet};
