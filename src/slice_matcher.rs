use ndarray::Array2;
use tracing::{debug, warn};

use crate::rasterizer::RasterizedSlice;

/// Index of the known slice position that coincides (to the micrometre)
/// with `position * spacing_z`. Returns `None` if no, or more than one,
/// known position matches.
pub fn match_slice_position(position: f64, known_positions: &[f64], spacing_z: f64) -> Option<usize> {
    let target = position * spacing_z;
    let mut matches = known_positions
        .iter()
        .enumerate()
        .filter(|&(_, known)| ((target - known).abs() * 1e3).round() == 0.0)
        .map(|(index, _)| index);

    let index = matches.next()?;
    if matches.next().is_some() {
        warn!(position = target, "Slice position matches more than one image slice");
        return None;
    }
    Some(index)
}

/// Assigns rasterized slices to slice indices of a grid with `depth`
/// slices. Unmatched and out-of-range slices are dropped.
pub fn match_slices(
    slices: Vec<RasterizedSlice>,
    known_positions: &[f64],
    spacing_z: f64,
    depth: usize,
) -> Vec<(usize, Array2<bool>)> {
    slices
        .into_iter()
        .filter_map(|slice| {
            let Some(index) = match_slice_position(slice.position, known_positions, spacing_z) else {
                let position = slice.position * spacing_z;
                if within(position, known_positions) {
                    warn!(position, "Contour slice does not match any image slice");
                } else {
                    debug!(position, "Dropping contour slice outside the image");
                }
                return None;
            };
            if index >= depth {
                debug!(index, depth, "Dropping contour slice outside the image");
                return None;
            }
            Some((index, slice.mask))
        })
        .collect()
}

fn within(position: f64, known_positions: &[f64]) -> bool {
    let (low, high) = known_positions
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &known| {
            (low.min(known), high.max(known))
        });
    (low..=high).contains(&position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(position: f64) -> RasterizedSlice {
        RasterizedSlice {
            position,
            mask: Array2::from_elem((2, 2), true),
        }
    }

    #[test]
    fn exact_position_returns_its_index() {
        let known = [0.0, 2.5, 5.0, 7.5];
        for (index, _) in known.iter().enumerate() {
            assert_eq!(match_slice_position(index as f64, &known, 2.5), Some(index));
        }
    }

    #[test]
    fn tolerates_sub_micrometre_differences() {
        let known = [0.0, 3.0, 6.0];
        assert_eq!(match_slice_position(2.001, &known, 3.0), None);
        assert_eq!(match_slice_position(2.00001, &known, 3.0), Some(2));
    }

    #[test]
    fn unmatched_position_is_none() {
        assert_eq!(match_slice_position(1.5, &[0.0, 1.0, 2.0], 1.0), None);
        assert_eq!(match_slice_position(-1.0, &[0.0, 1.0, 2.0], 1.0), None);
    }

    #[test]
    fn duplicate_known_positions_are_ambiguous() {
        assert_eq!(match_slice_position(1.0, &[0.0, 1.0, 1.0], 1.0), None);
    }

    #[test]
    fn unmatched_and_out_of_range_slices_are_dropped() {
        let known = [0.0, 1.0, 2.0, 3.0];
        let matched = match_slices(
            vec![slice(0.0), slice(0.5), slice(2.0), slice(3.0), slice(9.0)],
            &known,
            1.0,
            3,
        );
        let indices: Vec<usize> = matched.iter().map(|(index, _)| *index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
