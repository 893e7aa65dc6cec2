use nalgebra::{Matrix3, Vector3};

use crate::grid::{self, VoxelGrid, VoxelTransform};

type Polygon = Vec<Vector3<f64>>;

/// One or more closed polygons. The last point of each polygon connects
/// back to its first point.
///
/// A contour read from a structure set holds a single polygon in world
/// coordinates. Transforms return new contours; nothing is mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    polygons: Vec<Polygon>,
}

impl Contour {
    pub fn new(points: Vec<Vector3<f64>>) -> Self {
        Self {
            polygons: vec![points],
        }
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn points(&self) -> impl Iterator<Item = &Vector3<f64>> {
        self.polygons.iter().flatten()
    }

    pub fn to_voxel(&self, grid: &VoxelGrid) -> Self {
        self.to_voxel_with(&grid.origin, &grid.orientation, &grid.spacing)
    }

    /// Like [`Contour::to_voxel`], for a grid that need not exist yet.
    pub fn to_voxel_with(
        &self,
        origin: &Vector3<f64>,
        orientation: &Matrix3<f64>,
        spacing: &Vector3<f64>,
    ) -> Self {
        let transform = VoxelTransform::new(origin, orientation, spacing);
        Self {
            polygons: self
                .polygons
                .iter()
                .map(|polygon| polygon.iter().map(|point| transform.apply(point)).collect())
                .collect(),
        }
    }

    /// Slice coordinate of every polygon, taken from its first point.
    pub fn slice_coordinates(&self) -> impl Iterator<Item = f64> + '_ {
        self.polygons
            .iter()
            .filter_map(|polygon| polygon.first().map(|point| point[0]))
    }

    /// Whether every polygon lies in a plane of constant slice coordinate.
    pub fn is_planar(&self) -> bool {
        self.polygons.iter().all(|polygon| match polygon.first() {
            Some(first) => grid::all_close(polygon.iter().map(|point| point[0]), first[0]),
            None => true,
        })
    }

    /// Whether every polygon lies on an integer slice index.
    pub fn is_on_slice(&self) -> bool {
        self.slice_coordinates()
            .all(|position| grid::is_close(position.round(), position))
    }

    /// Sorted, unique slice indices touched by this contour (voxel space).
    pub fn which_slices(&self) -> Vec<i64> {
        let mut slices: Vec<i64> = self.points().map(|point| point[0].round() as i64).collect();
        slices.sort_unstable();
        slices.dedup();
        slices
    }

    /// Folds `others` into this contour for a single slice. Only polygons
    /// that touch `slice` are kept.
    pub fn merge(&self, others: &[&Contour], slice: i64) -> SliceContour {
        let polygons = std::iter::once(self)
            .chain(others.iter().copied())
            .flat_map(|contour| contour.polygons.iter())
            .filter(|polygon| {
                polygon
                    .iter()
                    .any(|point| point[0].round() as i64 == slice)
            })
            .cloned()
            .collect();
        SliceContour { slice, polygons }
    }
}

/// All polygons of an ROI that lie on one slice, in voxel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceContour {
    pub slice: i64,
    pub polygons: Vec<Polygon>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(z: f64, low: f64, high: f64) -> Contour {
        Contour::new(vec![
            Vector3::new(z, low, low),
            Vector3::new(z, low, high),
            Vector3::new(z, high, high),
            Vector3::new(z, high, low),
        ])
    }

    #[test]
    fn voxel_transform_keeps_structure() {
        let grid = VoxelGrid::axis_aligned(Vector3::new(2.0, 1.0, 1.0), [5, 10, 10]);
        let contour = square(4.0, 1.0, 3.0).to_voxel(&grid);
        assert_eq!(contour.polygons().len(), 1);
        assert_eq!(contour.which_slices(), vec![2]);
        assert!(contour.is_planar());
        assert!(contour.is_on_slice());
    }

    #[test]
    fn contour_transform_matches_point_transform() {
        let rotation = *nalgebra::Rotation3::from_euler_angles(0.2, -0.5, 0.9).matrix();
        let grid = VoxelGrid::new(
            Vector3::new(-30.0, 12.0, 4.5),
            Vector3::new(2.5, 0.8, 0.8),
            [10, 64, 64],
            rotation,
        );
        let contour = square(7.0, -3.0, 11.0);
        let voxels = contour.to_voxel(&grid);
        for (point, voxel) in contour.points().zip(voxels.points()) {
            approx::assert_relative_eq!(*voxel, grid.to_voxel(point), epsilon = 1e-12);
        }
    }

    #[test]
    fn tilted_contour_is_not_planar() {
        let contour = Contour::new(vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.4, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
        ]);
        assert!(!contour.is_planar());
        assert_eq!(contour.which_slices(), vec![1]);
    }

    #[test]
    fn fractional_slice_is_not_on_slice() {
        let contour = square(2.5, 0.0, 1.0);
        assert!(contour.is_planar());
        assert!(!contour.is_on_slice());
    }

    #[test]
    fn merge_collects_polygons_of_one_slice() {
        let outer = square(3.0, 0.0, 8.0);
        let hole = square(3.0, 2.0, 6.0);
        let elsewhere = square(4.0, 0.0, 8.0);
        let merged = outer.merge(&[&hole, &elsewhere], 3);
        assert_eq!(merged.slice, 3);
        assert_eq!(merged.polygons.len(), 2);
    }
}
