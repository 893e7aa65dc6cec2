//! Voxel grid descriptor and world/voxel coordinate transforms.
//!
//! All vectors are ordered `(z, y, x)`. Column `c` of the orientation matrix
//! is the world-space direction of voxel axis `c`, so column 0 is the slice
//! normal.

use nalgebra::{Matrix3, Vector3};

const RELATIVE_TOLERANCE: f64 = 1e-5;
const ABSOLUTE_TOLERANCE: f64 = 1e-8;

/// Floating point comparison with a relative and an absolute tolerance.
#[inline]
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * b.abs()
}

pub fn all_close(values: impl IntoIterator<Item = f64>, reference: f64) -> bool {
    values.into_iter().all(|value| is_close(value, reference))
}

/// Sorted values with near-duplicates removed.
pub fn unique_sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.into_iter().collect();
    values.sort_by(f64::total_cmp);
    values.dedup_by(|next, kept| is_close(*next, *kept));
    values
}

/// Smallest difference between consecutive sorted values.
pub fn min_gap(sorted: &[f64]) -> Option<f64> {
    sorted
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .min_by(f64::total_cmp)
}

/// World to voxel mapping with the orientation inverted up front, for
/// transforming many points onto the same grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelTransform {
    origin: Vector3<f64>,
    inverse: Matrix3<f64>,
    spacing: Vector3<f64>,
}

impl VoxelTransform {
    pub fn new(origin: &Vector3<f64>, orientation: &Matrix3<f64>, spacing: &Vector3<f64>) -> Self {
        // Orientation matrices are orthonormal; the transpose stands in if the
        // inverse cannot be formed.
        let inverse = orientation
            .try_inverse()
            .unwrap_or_else(|| orientation.transpose());
        Self {
            origin: *origin,
            inverse,
            spacing: *spacing,
        }
    }

    #[inline]
    pub fn apply(&self, point: &Vector3<f64>) -> Vector3<f64> {
        (self.inverse * (point - self.origin)).component_div(&self.spacing)
    }
}

/// Maps a world point to (fractional) voxel coordinates of the grid given by
/// `origin`, `orientation` and `spacing`.
pub fn to_voxel(
    point: &Vector3<f64>,
    origin: &Vector3<f64>,
    orientation: &Matrix3<f64>,
    spacing: &Vector3<f64>,
) -> Vector3<f64> {
    VoxelTransform::new(origin, orientation, spacing).apply(point)
}

/// Inverse of [`to_voxel`].
pub fn to_world(
    voxel: &Vector3<f64>,
    origin: &Vector3<f64>,
    orientation: &Matrix3<f64>,
    spacing: &Vector3<f64>,
) -> Vector3<f64> {
    origin + orientation * voxel.component_mul(spacing)
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    pub origin: Vector3<f64>,
    pub spacing: Vector3<f64>,
    pub dimension: [usize; 3],
    pub orientation: Matrix3<f64>,
}

impl VoxelGrid {
    pub fn new(
        origin: Vector3<f64>,
        spacing: Vector3<f64>,
        dimension: [usize; 3],
        orientation: Matrix3<f64>,
    ) -> Self {
        Self {
            origin,
            spacing,
            dimension,
            orientation,
        }
    }

    /// Axis-aligned grid with its origin at zero.
    pub fn axis_aligned(spacing: Vector3<f64>, dimension: [usize; 3]) -> Self {
        Self::new(Vector3::zeros(), spacing, dimension, Matrix3::identity())
    }

    pub fn to_voxel(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.voxel_transform().apply(point)
    }

    pub fn voxel_transform(&self) -> VoxelTransform {
        VoxelTransform::new(&self.origin, &self.orientation, &self.spacing)
    }

    pub fn to_world(&self, voxel: &Vector3<f64>) -> Vector3<f64> {
        to_world(voxel, &self.origin, &self.orientation, &self.spacing)
    }

    /// In-plane shape `(rows, columns)` of a single slice.
    pub fn slice_shape(&self) -> (usize, usize) {
        (self.dimension[1], self.dimension[2])
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.dimension[0], self.dimension[1], self.dimension[2])
    }

    /// Offsets of every slice along the slice normal, measured from the
    /// origin.
    pub fn slice_positions(&self) -> Vec<f64> {
        (0..self.dimension[0])
            .map(|index| index as f64 * self.spacing[0])
            .collect()
    }

    pub fn is_right_handed(&self) -> bool {
        self.orientation.determinant() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn oblique_grid() -> VoxelGrid {
        let rotation = Rotation3::from_euler_angles(0.3, -0.7, 1.1);
        VoxelGrid::new(
            Vector3::new(-120.5, 33.0, 7.25),
            Vector3::new(3.0, 0.97, 1.2),
            [40, 512, 512],
            *rotation.matrix(),
        )
    }

    #[test]
    fn world_voxel_round_trip() {
        let grid = oblique_grid();
        for point in [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(-87.2, 12.5, 150.0),
            Vector3::new(1e3, -1e3, 42.0),
        ] {
            let voxel = grid.to_voxel(&point);
            assert_relative_eq!(grid.to_world(&voxel), point, epsilon = 1e-9);
        }
    }

    #[test]
    fn axis_aligned_transform_scales_and_shifts() {
        let grid = VoxelGrid::new(
            Vector3::new(10.0, -5.0, 2.0),
            Vector3::new(2.0, 0.5, 0.5),
            [10, 10, 10],
            Matrix3::identity(),
        );
        let voxel = grid.to_voxel(&Vector3::new(14.0, -4.0, 3.0));
        assert_relative_eq!(voxel, Vector3::new(2.0, 2.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn override_parameters_project_into_normalised_space() {
        let grid = oblique_grid();
        let point = Vector3::new(5.0, 6.0, 7.0);
        let projected = to_voxel(
            &point,
            &Vector3::zeros(),
            &grid.orientation,
            &Vector3::repeat(1.0),
        );
        assert_relative_eq!(projected.norm(), point.norm(), epsilon = 1e-9);
    }

    #[test]
    fn slice_positions_follow_spacing() {
        let grid = VoxelGrid::axis_aligned(Vector3::new(2.5, 1.0, 1.0), [4, 2, 2]);
        assert_eq!(grid.slice_positions(), vec![0.0, 2.5, 5.0, 7.5]);
        assert!(grid.is_right_handed());
    }

    #[test]
    fn closeness_uses_relative_and_absolute_tolerance() {
        assert!(is_close(3.0, 3.0 + 1e-9));
        assert!(is_close(1000.0, 1000.005));
        assert!(!is_close(3.0, 3.01));
        assert!(all_close([2.0, 2.0, 2.0 + 1e-10], 2.0));
    }

    #[test]
    fn unique_values_and_gaps() {
        let unique = unique_sorted([5.0, 0.0, 5.0 + 1e-9, 2.0, 0.0]);
        assert_eq!(unique.len(), 3);
        assert_eq!(min_gap(&unique), Some(2.0));
        assert_eq!(min_gap(&[1.0]), None);
    }
}
