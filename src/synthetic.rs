//! Voxel grids derived from contour geometry.
//!
//! Used when contours cannot be mapped onto the slices of the reference
//! image. The reference image then only contributes what the strategy
//! marks as usable, and its in-plane spacing.

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::contour::Contour;
use crate::grid::{self, VoxelGrid};
use crate::reference::ReferenceImage;
use crate::strategy::ReferenceStrategy;

/// Principal axes of a point cloud as a right-handed orientation matrix.
///
/// Columns are ordered by increasing spread, so column 0 is the normal of
/// the plane the points lie closest to. Each axis is signed so that its
/// largest component is positive; if that yields a left-handed frame the
/// normal is flipped. Returns `None` for fewer than three points.
pub fn principal_orientation(points: &[Vector3<f64>]) -> Option<Matrix3<f64>> {
    if points.len() < 3 {
        return None;
    }

    let centroid = points.iter().sum::<Vector3<f64>>() / points.len() as f64;
    let mut scatter = Matrix3::zeros();
    for point in points {
        let centered = point - centroid;
        scatter += centered * centered.transpose();
    }

    let svd = scatter.svd(true, false);
    let u = svd.u?;

    let mut order = [0, 1, 2];
    order.sort_by(|&a, &b| svd.singular_values[a].total_cmp(&svd.singular_values[b]));

    let mut orientation = Matrix3::from_columns(&[
        u.column(order[0]).into_owned(),
        u.column(order[1]).into_owned(),
        u.column(order[2]).into_owned(),
    ]);

    for mut axis in orientation.column_iter_mut() {
        let dominant = axis.iamax();
        if axis[dominant] < 0.0 {
            axis.neg_mut();
        }
    }

    if orientation.determinant() < 0.0 {
        orientation.column_mut(0).neg_mut();
    }

    Some(orientation)
}

/// Builds the grid a ROI is rasterized on when the reference image grid
/// cannot be used as is.
///
/// The orientation comes from the reference image if the strategy marks it
/// usable, and from the principal axes of the contour points otherwise.
/// Likewise spacing, origin and dimension are copied from the reference
/// image if the position is usable, and fitted around the contours
/// otherwise.
pub fn build_grid(
    contours: &[Contour],
    template: &ReferenceImage,
    strategy: ReferenceStrategy,
) -> VoxelGrid {
    let orientation = if strategy.orientation_usable {
        template.grid.orientation
    } else {
        let points: Vec<_> = contours.iter().flat_map(Contour::points).copied().collect();
        principal_orientation(&points).unwrap_or_else(|| {
            debug!(
                points = points.len(),
                "Too few contour points for principal axes, using image orientation"
            );
            template.grid.orientation
        })
    };

    let grid = if strategy.position_usable {
        VoxelGrid::new(
            template.grid.origin,
            template.grid.spacing,
            template.grid.dimension,
            orientation,
        )
    } else {
        fit_grid(contours, template, orientation)
    };

    debug!(
        origin = ?grid.origin,
        spacing = ?grid.spacing,
        dimension = ?grid.dimension,
        "Built grid from contours"
    );
    grid
}

/// Grid in frame `orientation` that encloses all contour points, with one
/// voxel of margin around them in-plane.
fn fit_grid(contours: &[Contour], template: &ReferenceImage, orientation: Matrix3<f64>) -> VoxelGrid {
    let unit = Vector3::repeat(1.0);
    let projected: Vec<Contour> = contours
        .iter()
        .map(|contour| contour.to_voxel_with(&Vector3::zeros(), &orientation, &unit))
        .collect();

    let slice_values = grid::unique_sorted(projected.iter().flat_map(|contour| {
        contour.polygons().iter().filter(|polygon| !polygon.is_empty()).map(|polygon| {
            polygon.iter().map(|point| point[0]).sum::<f64>() / polygon.len() as f64
        })
    }));

    let spacing = Vector3::new(
        grid::min_gap(&slice_values)
            .filter(|&gap| gap > 0.0)
            .unwrap_or(template.grid.spacing[0]),
        template.grid.spacing[1],
        template.grid.spacing[2],
    );

    let mut lower = Vector3::repeat(f64::INFINITY);
    let mut upper = Vector3::repeat(f64::NEG_INFINITY);
    for point in projected.iter().flat_map(Contour::points) {
        lower = lower.inf(point);
        upper = upper.sup(point);
    }
    if let (Some(&first), Some(&last)) = (slice_values.first(), slice_values.last()) {
        lower[0] = first;
        upper[0] = last;
    }

    let origin = Vector3::new(lower[0], lower[1] - spacing[1], lower[2] - spacing[2]);
    let extent = (upper - origin).component_div(&spacing);
    let dimension = [
        voxel_count(extent[0]) + 1,
        voxel_count(extent[1]) + 1,
        voxel_count(extent[2]) + 1,
    ];

    VoxelGrid::new(
        grid::to_world(&origin, &Vector3::zeros(), &orientation, &unit),
        spacing,
        dimension,
        orientation,
    )
}

#[inline]
fn voxel_count(extent: f64) -> usize {
    (extent - 1e-6).ceil().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Rotation3;

    /// Rectangle with distinct extents along y and x, so the principal axes
    /// are unique.
    fn rectangle(z: f64) -> Contour {
        Contour::new(vec![
            Vector3::new(z, 4.0, 4.0),
            Vector3::new(z, 4.0, 30.0),
            Vector3::new(z, 20.0, 30.0),
            Vector3::new(z, 20.0, 4.0),
        ])
    }

    fn template() -> ReferenceImage {
        ReferenceImage::from_grid(VoxelGrid::new(
            Vector3::new(-50.0, -50.0, -50.0),
            Vector3::new(3.0, 0.5, 0.5),
            [30, 200, 200],
            Matrix3::identity(),
        ))
    }

    fn strategy(orientation_usable: bool, position_usable: bool) -> ReferenceStrategy {
        ReferenceStrategy {
            use_reference_image: false,
            orientation_usable,
            position_usable,
        }
    }

    #[test]
    fn principal_axes_of_axis_aligned_cloud() {
        let points: Vec<_> = [rectangle(0.0), rectangle(2.0)]
            .iter()
            .flat_map(|contour| contour.points().copied().collect::<Vec<_>>())
            .collect();
        let orientation = principal_orientation(&points).unwrap();
        assert_abs_diff_eq!(orientation, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn principal_axes_are_right_handed() {
        let rotation = Rotation3::from_euler_angles(0.4, 1.2, -0.9);
        for flip in [1.0, -1.0] {
            let points: Vec<_> = [rectangle(0.0), rectangle(2.0)]
                .iter()
                .flat_map(|contour| contour.points().copied().collect::<Vec<_>>())
                .map(|point| rotation * Vector3::new(point[0], point[1], flip * point[2]))
                .collect();
            let orientation = principal_orientation(&points).unwrap();
            assert_relative_eq!(orientation.determinant(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(
                (orientation.transpose() * orientation),
                Matrix3::identity(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn too_few_points_have_no_axes() {
        assert!(principal_orientation(&[Vector3::zeros(), Vector3::repeat(1.0)]).is_none());
    }

    #[test]
    fn fully_synthetic_grid_encloses_contours() {
        let contours = [rectangle(0.0), rectangle(6.0), rectangle(9.0)];
        let grid = build_grid(&contours, &template(), strategy(false, false));

        assert_relative_eq!(grid.orientation.determinant(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(grid.spacing, Vector3::new(3.0, 0.5, 0.5), epsilon = 1e-9);
        assert_relative_eq!(grid.origin, Vector3::new(0.0, 3.5, 3.5), epsilon = 1e-9);
        assert_eq!(grid.dimension, [4, 34, 54]);

        for contour in &contours {
            for point in contour.points() {
                let voxel = grid.to_voxel(point);
                assert!(voxel[1] >= 1.0 - 1e-9 && voxel[1] <= grid.dimension[1] as f64 - 1.0 + 1e-9);
                assert!(voxel[2] >= 1.0 - 1e-9 && voxel[2] <= grid.dimension[2] as f64 - 1.0 + 1e-9);
                assert_abs_diff_eq!(voxel[0], voxel[0].round(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn reference_orientation_with_synthetic_position() {
        let rotation = *Rotation3::from_euler_angles(0.0, 0.0, 0.3).matrix();
        let image = ReferenceImage::from_grid(VoxelGrid::new(
            Vector3::zeros(),
            Vector3::new(2.0, 1.0, 1.0),
            [10, 20, 20],
            rotation,
        ));
        let contours: Vec<_> = [rectangle(0.0), rectangle(10.0)]
            .iter()
            .map(|contour| {
                Contour::new(contour.points().map(|point| rotation * point).collect())
            })
            .collect();

        let grid = build_grid(&contours, &image, strategy(true, false));
        assert_eq!(grid.orientation, rotation);
        assert_relative_eq!(grid.spacing, Vector3::new(10.0, 1.0, 1.0), epsilon = 1e-9);
        assert_eq!(grid.dimension[0], 2);
        let corner = contours[1].points().next().copied().unwrap();
        assert_relative_eq!(grid.to_voxel(&corner)[0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn synthetic_orientation_with_reference_position() {
        let contours = [rectangle(0.0), rectangle(3.0)];
        let template = template();
        let grid = build_grid(&contours, &template, strategy(false, true));
        assert_abs_diff_eq!(grid.orientation, Matrix3::identity(), epsilon = 1e-9);
        assert_eq!(grid.origin, template.grid.origin);
        assert_eq!(grid.spacing, template.grid.spacing);
        assert_eq!(grid.dimension, template.grid.dimension);
    }

    #[test]
    fn single_slice_falls_back_to_template_slice_spacing() {
        let grid = build_grid(&[rectangle(5.0)], &template(), strategy(true, false));
        assert_eq!(grid.spacing[0], 3.0);
        assert_eq!(grid.dimension[0], 1);
    }
}
