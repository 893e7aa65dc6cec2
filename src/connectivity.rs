use std::collections::VecDeque;

use ndarray::{Array3, Zip};

/// Labels 26-connected foreground components. Labels start at 1 and are
/// assigned in raster order; background is 0. Returns the label volume and
/// the voxel count of each label (index 0 holds label 1).
pub fn label_components(mask: &Array3<bool>) -> (Array3<u32>, Vec<usize>) {
    let (depth, rows, columns) = mask.dim();
    let mut labels = Array3::<u32>::zeros(mask.raw_dim());
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for ((z, y, x), &foreground) in mask.indexed_iter() {
        if !foreground || labels[[z, y, x]] != 0 {
            continue;
        }

        let label = sizes.len() as u32 + 1;
        let mut size = 0;
        labels[[z, y, x]] = label;
        queue.push_back((z, y, x));

        while let Some((cz, cy, cx)) = queue.pop_front() {
            size += 1;
            for nz in cz.saturating_sub(1)..=(cz + 1).min(depth - 1) {
                for ny in cy.saturating_sub(1)..=(cy + 1).min(rows - 1) {
                    for nx in cx.saturating_sub(1)..=(cx + 1).min(columns - 1) {
                        if mask[[nz, ny, nx]] && labels[[nz, ny, nx]] == 0 {
                            labels[[nz, ny, nx]] = label;
                            queue.push_back((nz, ny, nx));
                        }
                    }
                }
            }
        }

        sizes.push(size);
    }

    (labels, sizes)
}

/// Keeps only the largest connected component. On equal sizes the
/// component found first wins.
pub fn keep_largest(mask: &Array3<bool>) -> Array3<bool> {
    let (labels, sizes) = label_components(mask);

    let mut largest = None;
    for (index, &size) in sizes.iter().enumerate() {
        if largest.is_none_or(|(_, best)| size > best) {
            largest = Some((index as u32 + 1, size));
        }
    }

    let Some((keep, _)) = largest else {
        return mask.clone();
    };
    Zip::from(&labels).map_collect(|&label| label == keep)
}
