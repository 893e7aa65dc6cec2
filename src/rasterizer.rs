use ndarray::Array2;

use crate::contour::SliceContour;
use crate::enums::RasterMethod;

/// Distance (in voxels) within which a coordinate counts as lying on a
/// voxel centre.
const SNAP_TOLERANCE: f64 = 1e-6;

/// Boolean in-plane mask of one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizedSlice {
    /// Slice-axis voxel coordinate of the slice.
    pub position: f64,
    pub mask: Array2<bool>,
}

pub struct Rasterizer;

impl Rasterizer {
    /// Draws `contour` onto a `(rows, columns)` grid.
    pub fn rasterize(
        method: RasterMethod,
        contour: &SliceContour,
        shape: (usize, usize),
    ) -> RasterizedSlice {
        let mask = match method {
            RasterMethod::RayCast => Self::ray_cast(contour, shape),
        };
        RasterizedSlice {
            position: contour.slice as f64,
            mask,
        }
    }

    /// Even-odd fill: a horizontal ray is cast through the centre of every
    /// row and the voxels between each pair of sorted edge crossings are set.
    /// Crossings of all polygons on the slice are pooled, so nested polygons
    /// become holes regardless of winding. Vertices and crossings within
    /// [`SNAP_TOLERANCE`] of a voxel centre are moved onto it first.
    fn ray_cast(contour: &SliceContour, (rows, columns): (usize, usize)) -> Array2<bool> {
        let mut mask = Array2::from_elem((rows, columns), false);
        let mut crossings = Vec::new();

        for row in 0..rows {
            let y = row as f64;
            crossings.clear();

            for polygon in &contour.polygons {
                let count = polygon.len();
                if count < 3 {
                    continue;
                }
                for (index, start) in polygon.iter().enumerate() {
                    let end = &polygon[(index + 1) % count];
                    let (y0, x0) = (snap(start[1]), snap(start[2]));
                    let (y1, x1) = (snap(end[1]), snap(end[2]));
                    if (y0 > y) != (y1 > y) {
                        crossings.push(snap(x0 + (y - y0) * (x1 - x0) / (y1 - y0)));
                    }
                }
            }

            if crossings.is_empty() {
                continue;
            }
            crossings.sort_by(f64::total_cmp);

            for pair in crossings.chunks_exact(2) {
                let first = Self::column_index(pair[0], columns);
                let last = Self::column_index(pair[1], columns);
                for column in first..last {
                    mask[[row, column]] = true;
                }
            }
        }

        mask
    }

    /// First column whose centre lies at or beyond `x`, clamped to the grid.
    #[inline]
    fn column_index(x: f64, columns: usize) -> usize {
        x.ceil().clamp(0.0, columns as f64) as usize
    }
}

#[inline]
fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() <= SNAP_TOLERANCE {
        nearest
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn square(low: f64, high: f64, clockwise: bool) -> Vec<Vector3<f64>> {
        let mut points = vec![
            Vector3::new(0.0, low, low),
            Vector3::new(0.0, low, high),
            Vector3::new(0.0, high, high),
            Vector3::new(0.0, high, low),
        ];
        if clockwise {
            points.reverse();
        }
        points
    }

    fn slice(polygons: Vec<Vec<Vector3<f64>>>) -> SliceContour {
        SliceContour { slice: 0, polygons }
    }

    #[test]
    fn square_covers_voxel_centres_inside() {
        let rasterized =
            Rasterizer::rasterize(RasterMethod::RayCast, &slice(vec![square(1.5, 5.5, false)]), (10, 10));
        for ((row, column), &value) in rasterized.mask.indexed_iter() {
            let inside = (2..=5).contains(&row) && (2..=5).contains(&column);
            assert_eq!(value, inside, "voxel ({row}, {column})");
        }
        assert_eq!(rasterized.mask.iter().filter(|&&v| v).count(), 16);
        assert_eq!(rasterized.position, 0.0);
    }

    #[test]
    fn winding_does_not_matter() {
        let counter = Rasterizer::rasterize(RasterMethod::RayCast, &slice(vec![square(0.5, 7.5, false)]), (10, 10));
        let clockwise = Rasterizer::rasterize(RasterMethod::RayCast, &slice(vec![square(0.5, 7.5, true)]), (10, 10));
        assert_eq!(counter.mask, clockwise.mask);
    }

    #[test]
    fn nested_square_becomes_a_hole() {
        let rasterized = Rasterizer::rasterize(
            RasterMethod::RayCast,
            &slice(vec![square(0.5, 8.5, false), square(2.5, 6.5, false)]),
            (10, 10),
        );
        let mask = &rasterized.mask;
        assert!(mask[[1, 1]]);
        assert!(mask[[8, 8]]);
        assert!(mask[[1, 5]]);
        assert!(!mask[[3, 3]]);
        assert!(!mask[[6, 6]]);
        assert!(!mask[[0, 0]]);
        assert!(!mask[[9, 9]]);
        assert_eq!(mask.iter().filter(|&&v| v).count(), 64 - 16);
    }

    #[test]
    fn polygon_beyond_grid_is_clipped() {
        let rasterized =
            Rasterizer::rasterize(RasterMethod::RayCast, &slice(vec![square(-3.5, 2.5, false)]), (4, 4));
        assert_eq!(rasterized.mask.iter().filter(|&&v| v).count(), 9);
        assert!(rasterized.mask[[0, 0]]);
        assert!(!rasterized.mask[[3, 0]]);
    }

    #[test]
    fn vertices_near_voxel_centres_are_snapped() {
        let jittered = vec![
            Vector3::new(0.0, 1.0 + 2e-15, 1.0 - 3e-15),
            Vector3::new(0.0, 1.0 - 1e-15, 6.0 + 4e-15),
            Vector3::new(0.0, 4.0 + 1e-14, 6.0 - 2e-15),
            Vector3::new(0.0, 4.0 - 1e-14, 1.0 + 1e-15),
        ];
        let rasterized = Rasterizer::rasterize(RasterMethod::RayCast, &slice(vec![jittered]), (8, 8));
        // Rows 1..=3, columns 1..=5.
        assert_eq!(rasterized.mask.iter().filter(|&&v| v).count(), 15);
        for row in 1..=3 {
            assert!(rasterized.mask[[row, 1]]);
            assert!(!rasterized.mask[[row, 6]]);
        }
        assert!(!rasterized.mask[[4, 3]]);
    }

    #[test]
    fn degenerate_polygons_are_ignored() {
        let line = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 4.0, 4.0)];
        let rasterized = Rasterizer::rasterize(RasterMethod::RayCast, &slice(vec![line]), (5, 5));
        assert!(!rasterized.mask.iter().any(|&v| v));
    }
}
