//! Trimap construction from soft segmentation masks
//!
//! Pixels above the foreground threshold and below the background threshold
//! are shrunk by binary erosion with a square all-ones structure, then painted
//! onto an all-unknown canvas.

use crate::types::{Mask, Trimap, TRIMAP_BACKGROUND, TRIMAP_FOREGROUND, TRIMAP_UNKNOWN};
use image::GrayImage;
use ndarray::{Array2, Axis};

/// Build a trimap from a soft mask
///
/// * `foreground_threshold` - values strictly above are likely foreground
/// * `background_threshold` - values strictly below are likely background
/// * `erode_size` - side of the square erosion structure, 0 disables erosion
///
/// Pixels outside the canvas count as absent from the foreground grid and
/// present in the background grid, so the canvas border erodes foreground
/// but never background.
///
/// Threshold ordering is not checked here. When both grids claim a pixel the
/// pixel is foreground.
#[must_use]
pub fn build_trimap(
    mask: &Mask,
    foreground_threshold: u8,
    background_threshold: u8,
    erode_size: u32,
) -> Trimap {
    let (width, height) = mask.dimensions();
    let grid = mask_to_array(mask);

    let mut is_foreground = grid.mapv(|v| v > foreground_threshold);
    let mut is_background = grid.mapv(|v| v < background_threshold);

    if erode_size > 1 {
        let size = erode_size as usize;
        is_foreground = binary_erosion(&is_foreground, size, false);
        is_background = binary_erosion(&is_background, size, true);
    }

    let trimap = GrayImage::from_fn(width, height, |x, y| {
        let idx = [y as usize, x as usize];
        let value = if is_foreground[idx] {
            TRIMAP_FOREGROUND
        } else if is_background[idx] {
            TRIMAP_BACKGROUND
        } else {
            TRIMAP_UNKNOWN
        };
        image::Luma([value])
    });

    let trimap = Trimap::from_gray_unchecked(trimap);
    let stats = trimap.statistics();
    log::debug!(
        "Trimap {width}x{height}: {} foreground, {} unknown, {} background (erode {erode_size})",
        stats.foreground,
        stats.unknown,
        stats.background
    );
    trimap
}

fn mask_to_array(mask: &Mask) -> Array2<u8> {
    let (width, height) = mask.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
        mask.value(col as u32, row as u32)
    })
}

/// Binary erosion by an all-ones square of side `size`
///
/// The window spans offsets `-(size / 2)..=size - 1 - size / 2` on both
/// axes. Out-of-canvas samples read as `border_value`.
#[must_use]
pub fn binary_erosion(grid: &Array2<bool>, size: usize, border_value: bool) -> Array2<bool> {
    if size <= 1 {
        return grid.clone();
    }
    let rows = erode_lanes(grid, Axis(1), size, border_value);
    erode_lanes(&rows, Axis(0), size, border_value)
}

/// One-dimensional erosion of every lane along `axis`
fn erode_lanes(grid: &Array2<bool>, axis: Axis, size: usize, border_value: bool) -> Array2<bool> {
    let before = size / 2;
    let after = size - 1 - before;
    let mut out = Array2::from_elem(grid.dim(), false);

    for (input, mut output) in grid.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let len = input.len();
        // Running count of false samples
        let mut misses = Vec::with_capacity(len + 1);
        misses.push(0usize);
        for &value in &input {
            let last = misses.last().copied().unwrap_or(0);
            misses.push(last + usize::from(!value));
        }

        for (i, slot) in output.iter_mut().enumerate() {
            let clipped = i < before || i + after >= len;
            if clipped && !border_value {
                *slot = false;
                continue;
            }
            let start = i.saturating_sub(before);
            let end = (i + after).min(len - 1);
            *slot = misses[end + 1] == misses[start];
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrimapStatistics;

    fn gradient_mask(width: u32, height: u32) -> Mask {
        Mask::new(GrayImage::from_fn(width, height, |x, y| {
            image::Luma([((x * 37 + y * 91) % 256) as u8])
        }))
    }

    fn disc_mask(size: u32) -> Mask {
        let c = size as f32 / 2.0;
        Mask::new(GrayImage::from_fn(size, size, |x, y| {
            let d = (x as f32 - c).hypot(y as f32 - c);
            image::Luma([(255.0 - (d / c * 255.0).min(255.0)) as u8])
        }))
    }

    #[test]
    fn test_values_are_three_classes() {
        let mask = gradient_mask(17, 11);
        for erode in [0, 1, 2, 3, 10] {
            let trimap = build_trimap(&mask, 200, 50, erode);
            assert!(trimap
                .as_image()
                .as_raw()
                .iter()
                .all(|v| matches!(*v, 0 | 128 | 255)));
        }
    }

    #[test]
    fn test_thresholds_are_strict_without_erosion() {
        let mask = Mask::from_raw(5, 1, vec![9, 10, 128, 240, 241]).unwrap();
        let trimap = build_trimap(&mask, 240, 10, 0);
        let values: Vec<u8> = trimap.as_image().as_raw().clone();
        assert_eq!(values, vec![0, 128, 128, 128, 255]);
    }

    #[test]
    fn test_border_erodes_foreground_not_background() {
        let solid = Mask::filled(6, 6, 255);
        let trimap = build_trimap(&solid, 240, 10, 3);
        for y in 0..6 {
            for x in 0..6 {
                let on_border = x == 0 || y == 0 || x == 5 || y == 5;
                let expected = if on_border { 128 } else { 255 };
                assert_eq!(trimap.value(x, y), expected, "pixel ({x}, {y})");
            }
        }

        let empty = Mask::filled(6, 6, 0);
        let trimap = build_trimap(&empty, 240, 10, 3);
        assert_eq!(trimap.statistics().background, 36);
    }

    #[test]
    fn test_even_structure_is_anchored_at_half_size() {
        let solid = Mask::filled(5, 5, 255);
        let trimap = build_trimap(&solid, 240, 10, 2);
        for y in 0..5 {
            for x in 0..5 {
                let expected = if x == 0 || y == 0 { 128 } else { 255 };
                assert_eq!(trimap.value(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_erode_size_one_is_identity() {
        let mask = gradient_mask(9, 9);
        assert_eq!(build_trimap(&mask, 180, 60, 0), build_trimap(&mask, 180, 60, 1));
    }

    #[test]
    fn test_erosion_is_monotonic() {
        let mask = disc_mask(40);
        let mut previous: Option<TrimapStatistics> = None;
        for erode in 0..=12 {
            let stats = build_trimap(&mask, 200, 40, erode).statistics();
            if let Some(prev) = previous {
                assert!(stats.foreground <= prev.foreground, "erode {erode}");
                assert!(stats.background <= prev.background, "erode {erode}");
            }
            previous = Some(stats);
        }
    }

    #[test]
    fn test_erosion_removes_thin_features() {
        let mut image = GrayImage::from_pixel(9, 9, image::Luma([0]));
        for y in 0..9 {
            image.put_pixel(4, y, image::Luma([255]));
        }
        let trimap = build_trimap(&Mask::new(image), 240, 10, 3);
        assert_eq!(trimap.statistics().foreground, 0);
        // Background pixels next to the line become unknown
        assert_eq!(trimap.value(3, 4), 128);
        assert_eq!(trimap.value(0, 4), 0);
    }

    #[test]
    fn test_overlap_prefers_foreground() {
        let mask = Mask::filled(3, 3, 128);
        let trimap = build_trimap(&mask, 10, 240, 0);
        assert_eq!(trimap.statistics().foreground, 9);
    }

    #[test]
    fn test_binary_erosion_matches_brute_force() {
        let grid = Array2::from_shape_fn((7, 8), |(r, c)| (r * 3 + c * 5) % 7 != 0);
        for size in 2..=4usize {
            for border in [false, true] {
                let fast = binary_erosion(&grid, size, border);
                let before = (size / 2) as isize;
                let after = (size - 1 - size / 2) as isize;
                for r in 0..7isize {
                    for c in 0..8isize {
                        let mut all = true;
                        for dr in -before..=after {
                            for dc in -before..=after {
                                let (rr, cc) = (r + dr, c + dc);
                                let value = if rr < 0 || cc < 0 || rr >= 7 || cc >= 8 {
                                    border
                                } else {
                                    grid[[rr as usize, cc as usize]]
                                };
                                all &= value;
                            }
                        }
                        assert_eq!(fast[[r as usize, c as usize]], all, "size {size} border {border}");
                    }
                }
            }
        }
    }
}
